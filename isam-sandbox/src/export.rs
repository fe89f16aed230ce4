use isam_core::{
    nalgebra::{Point3, Vector3},
    Values,
};
use ply_rs::{
    ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType,
    },
    writer::Writer,
};
use std::fs::File;
use std::io;
use std::path::PathBuf;

const LANDMARK_COLOR: [u8; 3] = [255, 0, 0];
const CAMERA_COLOR: [u8; 3] = [255, 0, 255];

/// A sink the driver hands the current estimates to after each frame.
///
/// Purely observational; nothing flows back into the estimator.
pub trait Visualizer {
    fn render(&mut self, frame: usize, estimate: &Values) -> io::Result<()>;
}

/// Used when no output directory was given.
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
    fn render(&mut self, _frame: usize, _estimate: &Values) -> io::Result<()> {
        Ok(())
    }
}

/// Writes an ASCII PLY snapshot of the estimate per frame: landmarks as red
/// points and every camera as a magenta wireframe pyramid opening along its
/// viewing direction.
pub struct PlyVisualizer {
    directory: PathBuf,
    marker_scale: f64,
}

impl PlyVisualizer {
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            marker_scale: 2.0,
        }
    }
}

impl Visualizer for PlyVisualizer {
    fn render(&mut self, frame: usize, estimate: &Values) -> io::Result<()> {
        let mut ply = Ply::<DefaultElement>::new();
        ply.header.encoding = Encoding::Ascii;
        ply.header
            .comments
            .push("Exported from isam-sandbox".to_string());

        let mut point_element = ElementDef::new("vertex".to_string());
        for name in ["x", "y", "z"] {
            let p = PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::Double));
            point_element.properties.add(p);
        }
        for name in ["red", "green", "blue"] {
            let p = PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::UChar));
            point_element.properties.add(p);
        }
        ply.header.elements.add(point_element);

        let mut face_element = ElementDef::new("face".to_string());
        let vertex_list = PropertyDef::new(
            "vertex_index".to_string(),
            PropertyType::List(ScalarType::UChar, ScalarType::Int),
        );
        face_element.properties.add(vertex_list);
        ply.header.elements.add(face_element);

        let mut vertices: Vec<DefaultElement> = vec![];
        let mut faces: Vec<DefaultElement> = vec![];

        let mut add_vertex = |p: Point3<f64>, [r, g, b]: [u8; 3]| -> usize {
            let pos = vertices.len();
            let mut point = DefaultElement::new();
            point.insert("x".to_string(), Property::Double(p.x));
            point.insert("y".to_string(), Property::Double(p.y));
            point.insert("z".to_string(), Property::Double(p.z));
            point.insert("red".to_string(), Property::UChar(r));
            point.insert("green".to_string(), Property::UChar(g));
            point.insert("blue".to_string(), Property::UChar(b));
            vertices.push(point);
            pos
        };

        for (_, pose) in estimate.poses() {
            let optical_center = pose.translation();
            let rotation = pose.rotation();
            let forward = rotation * Vector3::z();
            // Camera y points down, so the display-up direction is its negation.
            let up = -(rotation * Vector3::y());
            let right = forward.cross(&up);
            let center = add_vertex(optical_center, CAMERA_COLOR);
            let corners = [(1.0, 1.0), (1.0, -1.0), (-1.0, -1.0), (-1.0, 1.0)].map(|(u, r)| {
                add_vertex(
                    optical_center
                        + self.marker_scale * (forward + u * up + r * right),
                    CAMERA_COLOR,
                )
            });
            for ix in 0..corners.len() {
                let mut face = DefaultElement::new();
                face.insert(
                    "vertex_index".to_string(),
                    Property::ListInt(vec![
                        center as i32,
                        corners[ix] as i32,
                        corners[(ix + 1) % corners.len()] as i32,
                    ]),
                );
                faces.push(face);
            }
        }

        for (_, point) in estimate.points() {
            add_vertex(point, LANDMARK_COLOR);
        }

        ply.payload.insert("vertex".to_string(), vertices);
        ply.payload.insert("face".to_string(), faces);

        let path = self.directory.join(format!("frame_{:03}.ply", frame));
        let mut file = File::create(path)?;
        Writer::new().write_ply(&mut file, &mut ply)?;
        Ok(())
    }
}
