//! g2o text format writer.
//!
//! ```text
//! VERTEX_SE2 id x y theta
//! VERTEX_SE3:QUAT id x y z qx qy qz qw
//! EDGE_SE2 from to dx dy dtheta I11 I12 I13 I22 I23 I33
//! EDGE_SE3:QUAT from to x y z qx qy qz qw I11 .. I66 (upper triangle)
//! ```
//!
//! Vertex ids are raw key values. Priors have no g2o record and are skipped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::DMatrix;

use crate::core::{Key, Value, Values};
use crate::error::Result;
use crate::graph::{Factor, FactorGraph};

/// g2o orders SE(3) information translation-first; tangents here are
/// rotation-first.
const SE3_G2O_ORDER: [usize; 6] = [3, 4, 5, 0, 1, 2];

/// Write `graph` and `values` to a g2o file.
pub fn write_g2o(graph: &FactorGraph, values: &Values, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_records(&mut writer, graph, values)?;
    writer.flush()?;
    Ok(())
}

/// Render `graph` and `values` as g2o text.
pub fn to_g2o_string(graph: &FactorGraph, values: &Values) -> String {
    let mut buffer = Vec::new();
    // Writing into memory cannot fail
    let _ = write_records(&mut buffer, graph, values);
    String::from_utf8_lossy(&buffer).into_owned()
}

fn write_records<W: Write>(
    w: &mut W,
    graph: &FactorGraph,
    values: &Values,
) -> std::io::Result<()> {
    for (key, value) in values.iter() {
        write_vertex(w, key, value)?;
    }
    for factor in graph {
        if let Factor::Between(f) = factor {
            write_edge(w, f.from, f.to, &f.measurement, f.information.matrix())?;
        }
    }
    Ok(())
}

fn write_vertex<W: Write>(w: &mut W, key: Key, value: &Value) -> std::io::Result<()> {
    match value {
        Value::Pose2(p) => writeln!(w, "VERTEX_SE2 {} {} {} {}", key.raw(), p.x, p.y, p.theta),
        Value::Pose3(p) => {
            let t = p.translation();
            let q = p.rotation();
            writeln!(
                w,
                "VERTEX_SE3:QUAT {} {} {} {} {} {} {} {}",
                key.raw(),
                t.x,
                t.y,
                t.z,
                q.i,
                q.j,
                q.k,
                q.w
            )
        }
    }
}

fn write_edge<W: Write>(
    w: &mut W,
    from: Key,
    to: Key,
    measurement: &Value,
    information: &DMatrix<f64>,
) -> std::io::Result<()> {
    match measurement {
        Value::Pose2(p) => {
            write!(w, "EDGE_SE2 {} {} {} {} {}", from.raw(), to.raw(), p.x, p.y, p.theta)?;
            write_upper_triangle(w, information, &[0, 1, 2])?;
        }
        Value::Pose3(p) => {
            let t = p.translation();
            let q = p.rotation();
            write!(
                w,
                "EDGE_SE3:QUAT {} {} {} {} {} {} {} {} {}",
                from.raw(),
                to.raw(),
                t.x,
                t.y,
                t.z,
                q.i,
                q.j,
                q.k,
                q.w
            )?;
            write_upper_triangle(w, information, &SE3_G2O_ORDER)?;
        }
    }
    writeln!(w)
}

/// Upper triangle of `m` after permuting rows/columns by `order`.
/// Entries outside `m` are written as zero.
fn write_upper_triangle<W: Write>(
    w: &mut W,
    m: &DMatrix<f64>,
    order: &[usize],
) -> std::io::Result<()> {
    for (i, &r) in order.iter().enumerate() {
        for &c in &order[i..] {
            let v = if r < m.nrows() && c < m.ncols() { m[(r, c)] } else { 0.0 };
            write!(w, " {}", v)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LiePose, Pose2D, Pose3D};
    use crate::graph::Information;
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn test_se2_records() {
        let a0 = Key::symbol('a', 0);
        let a1 = Key::symbol('a', 1);
        let mut values = Values::new();
        values.insert(a0, Pose2D::new(0.0, 0.0, 0.0));
        values.insert(a1, Pose2D::new(1.0, 2.0, 0.5));

        let mut graph = FactorGraph::new();
        graph.push(Factor::prior(a0, Pose2D::default(), Information::identity(3)));
        graph.push(Factor::between(
            a0,
            a1,
            Pose2D::new(1.0, 2.0, 0.5),
            Information::diagonal(&[10.0, 20.0, 30.0]),
        ));

        let text = to_g2o_string(&graph, &values);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("VERTEX_SE2 {} 0 0 0", a0.raw()));
        assert_eq!(lines[1], format!("VERTEX_SE2 {} 1 2 0.5", a1.raw()));
        assert_eq!(
            lines[2],
            format!("EDGE_SE2 {} {} 1 2 0.5 10 0 0 20 0 30", a0.raw(), a1.raw())
        );
    }

    #[test]
    fn test_se3_information_translation_first() {
        let a0 = Key::symbol('a', 0);
        let a1 = Key::symbol('a', 1);
        let step = Pose3D::new(Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity());
        let mut values = Values::new();
        values.insert(a0, Pose3D::identity());
        values.insert(a1, step);

        let mut graph = FactorGraph::new();
        // Rotation block 1, translation block 100
        graph.push(Factor::between(
            a0,
            a1,
            step,
            Information::diagonal(&[1.0, 1.0, 1.0, 100.0, 100.0, 100.0]),
        ));

        let text = to_g2o_string(&graph, &values);
        let edge = text.lines().last().unwrap();
        let fields: Vec<&str> = edge.split_whitespace().collect();
        assert_eq!(fields[0], "EDGE_SE3:QUAT");
        assert_eq!(fields.len(), 1 + 2 + 7 + 21);
        assert_eq!(&fields[3..10], &["1", "0", "0", "0", "0", "0", "1"]);
        // First information entry is the x translation
        assert_eq!(fields[10], "100");
        assert_eq!(fields[30], "1");
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.g2o");
        let mut values = Values::new();
        values.insert(Key::symbol('x', 0), Pose2D::default());
        write_g2o(&FactorGraph::new(), &values, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("VERTEX_SE2"));
    }
}
