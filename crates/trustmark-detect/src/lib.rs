// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// trustmark-detect: the independent detection modules. Each one reads the
// shared `DocumentFacts` and returns a single `ModuleResult`.

pub mod content;
pub mod external;
pub mod fonts;
pub mod images;
pub mod metadata;
pub mod structure;
pub mod template;
pub mod traits;
pub mod visual;

pub use content::ContentModule;
pub use external::{CompanyRecord, ExternalModule, InMemoryRegistry, VatStatus};
pub use fonts::FontsModule;
pub use images::ImagesModule;
pub use metadata::MetadataModule;
pub use structure::StructureModule;
pub use template::{InMemoryTemplateStore, IssuerTemplate, TemplateModule};
pub use traits::{DetectionModule, RegistryClient, TemplateStore};
pub use visual::VisualModule;
