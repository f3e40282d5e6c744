// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream walker: tracks the graphics and text matrices just far
// enough to learn where each font is used and how large each image XObject
// is drawn.

use std::collections::HashMap;

use lopdf::Object;
use lopdf::content::Operation;

use crate::pdf::objects::number;

/// Affine matrix `[a b c d e f]` as used by `cm` and `Tm`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other` in PDF row-vector convention.
    fn then(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        let values: Vec<f32> = operands.iter().filter_map(number).collect();
        let array: [f32; 6] = values.try_into().ok()?;
        Some(Matrix(array))
    }

    /// Lengths of the transformed unit vectors (drawn width and height of a unit square).
    fn scale(&self) -> (f32, f32) {
        let [a, b, c, d, _, _] = self.0;
        ((a * a + b * b).sqrt(), (c * c + d * d).sqrt())
    }
}

/// What one page's content stream revealed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageScan {
    /// Font resource name and baseline y (user space) for every text-showing operator.
    pub text_runs: Vec<(Vec<u8>, f32)>,
    /// Drawn size in points of each XObject, keyed by resource name (first placement wins).
    pub placements: HashMap<Vec<u8>, (f32, f32)>,
}

impl PageScan {
    /// Assign 1-based line numbers to the recorded baselines, top of page first.
    ///
    /// Baselines within `tolerance` points share a line.
    pub fn font_lines(&self, tolerance: f32) -> Vec<(Vec<u8>, u32)> {
        let mut baselines: Vec<f32> = self.text_runs.iter().map(|(_, y)| *y).collect();
        baselines.sort_by(|a, b| b.total_cmp(a));

        let mut lines: Vec<f32> = Vec::new();
        for y in baselines {
            if lines.last().is_none_or(|last| (last - y).abs() > tolerance) {
                lines.push(y);
            }
        }

        self.text_runs
            .iter()
            .map(|(font, y)| {
                let line = lines
                    .iter()
                    .position(|line_y| (line_y - y).abs() <= tolerance)
                    .map_or(0, |index| index as u32 + 1);
                (font.clone(), line)
            })
            .collect()
    }
}

/// Walk a decoded operation list.
pub fn scan_operations(operations: &[Operation]) -> PageScan {
    let mut scan = PageScan::default();

    let mut ctm = Matrix::IDENTITY;
    let mut stack: Vec<Matrix> = Vec::new();
    let mut text_matrix = Matrix::IDENTITY;
    let mut line_matrix = Matrix::IDENTITY;
    let mut leading = 0.0f32;
    let mut font: Option<Vec<u8>> = None;

    let operand = |op: &Operation, index: usize| op.operands.get(index).and_then(number);

    for op in operations {
        match op.operator.as_str() {
            "q" => stack.push(ctm),
            "Q" => ctm = stack.pop().unwrap_or(Matrix::IDENTITY),
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(&op.operands) {
                    ctm = matrix.then(&ctm);
                }
            }
            "BT" => {
                text_matrix = Matrix::IDENTITY;
                line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                font = op.operands.first().and_then(|object| match object {
                    Object::Name(name) => Some(name.clone()),
                    _ => None,
                });
            }
            "TL" => leading = operand(op, 0).unwrap_or(leading),
            "Td" | "TD" => {
                let tx = operand(op, 0).unwrap_or(0.0);
                let ty = operand(op, 1).unwrap_or(0.0);
                if op.operator == "TD" {
                    leading = -ty;
                }
                line_matrix = Matrix::translation(tx, ty).then(&line_matrix);
                text_matrix = line_matrix;
            }
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(&op.operands) {
                    line_matrix = matrix;
                    text_matrix = matrix;
                }
            }
            "T*" => {
                line_matrix = Matrix::translation(0.0, -leading).then(&line_matrix);
                text_matrix = line_matrix;
            }
            "'" | "\"" => {
                line_matrix = Matrix::translation(0.0, -leading).then(&line_matrix);
                text_matrix = line_matrix;
                record_run(&mut scan, &font, &text_matrix, &ctm);
            }
            "Tj" | "TJ" => record_run(&mut scan, &font, &text_matrix, &ctm),
            "Do" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    scan.placements.entry(name.clone()).or_insert_with(|| ctm.scale());
                }
            }
            _ => {}
        }
    }

    scan
}

fn record_run(scan: &mut PageScan, font: &Option<Vec<u8>>, text_matrix: &Matrix, ctm: &Matrix) {
    if let Some(font) = font {
        let baseline = text_matrix.then(ctm).0[5];
        scan.text_runs.push((font.clone(), baseline));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    #[test]
    fn image_placement_size_comes_from_ctm() {
        let operations = vec![
            op("q", vec![]),
            op("cm", vec![144.into(), 0.into(), 0.into(), 72.into(), 100.into(), 500.into()]),
            op("Do", vec![Object::Name(b"Im1".to_vec())]),
            op("Q", vec![]),
        ];
        let scan = scan_operations(&operations);
        assert_eq!(scan.placements.get(b"Im1".as_slice()), Some(&(144.0, 72.0)));
    }

    #[test]
    fn nested_cm_multiplies() {
        let operations = vec![
            op("cm", vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()]),
            op("q", vec![]),
            op("cm", vec![50.into(), 0.into(), 0.into(), 25.into(), 0.into(), 0.into()]),
            op("Do", vec![Object::Name(b"Im0".to_vec())]),
            op("Q", vec![]),
        ];
        let scan = scan_operations(&operations);
        assert_eq!(scan.placements.get(b"Im0".as_slice()), Some(&(100.0, 50.0)));
    }

    #[test]
    fn text_runs_track_baselines_and_lines() {
        let operations = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
            op("Td", vec![72.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("Invoice")]),
            op("Tf", vec![Object::Name(b"F2".to_vec()), 12.into()]),
            op("Tj", vec![Object::string_literal("Total")]),
            op("TD", vec![0.into(), (-14).into()]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
            op("Tj", vec![Object::string_literal("Due")]),
            op("T*", vec![]),
            op("Tj", vec![Object::string_literal("Paid")]),
            op("ET", vec![]),
        ];
        let scan = scan_operations(&operations);
        let baselines: Vec<f32> = scan.text_runs.iter().map(|(_, y)| *y).collect();
        assert_eq!(baselines, vec![700.0, 700.0, 686.0, 672.0]);

        let lines = scan.font_lines(2.0);
        assert_eq!(lines[0], (b"F1".to_vec(), 1));
        assert_eq!(lines[1], (b"F2".to_vec(), 1));
        assert_eq!(lines[2].1, 2);
        assert_eq!(lines[3].1, 3);
    }

    #[test]
    fn unbalanced_restore_falls_back_to_identity() {
        let operations = vec![
            op("Q", vec![]),
            op("Do", vec![Object::Name(b"Im9".to_vec())]),
        ];
        let scan = scan_operations(&operations);
        assert_eq!(scan.placements.get(b"Im9".as_slice()), Some(&(1.0, 1.0)));
    }
}
