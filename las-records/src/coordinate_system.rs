use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for [CoordinateSystem::encode_position].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinateSystemError {
    #[error(
        "The coordinate cannot be represented in this coordinate system, because it is out of its bounds."
    )]
    OutOfBounds,
}

/// The coordinate system is used to convert between
/// the stored integer coordinates of a point record and actual "world coordinates":
/// `world = stored * scale + offset`
#[derive(Debug, Clone, PartialEq, Copy, Serialize, Deserialize)]
pub struct CoordinateSystem {
    scale: Vector3<f64>,
    offset: Vector3<f64>,
}

impl CoordinateSystem {
    /// Construct a new coordinate system with unit scale and no offset
    pub fn new_identity() -> Self {
        CoordinateSystem {
            scale: Vector3::new(1.0, 1.0, 1.0),
            offset: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    /// Construct a new coordinate system with the given scale and offset
    pub fn from_las_transform(scale: Vector3<f64>, offset: Vector3<f64>) -> Self {
        CoordinateSystem { scale, offset }
    }

    pub fn scale(&self) -> &Vector3<f64> {
        &self.scale
    }

    pub fn offset(&self) -> &Vector3<f64> {
        &self.offset
    }

    pub fn encode_position(
        &self,
        global: Point3<f64>,
    ) -> Result<Point3<i32>, CoordinateSystemError> {
        let inner = (global.coords - self.offset).component_div(&self.scale);

        let int_min = f64::from(i32::MIN);
        let int_max = f64::from(i32::MAX);
        if inner.iter().any(|c| !(int_min..=int_max).contains(c)) {
            return Err(CoordinateSystemError::OutOfBounds);
        }

        Ok(inner.map(|c| c.round() as i32).into())
    }

    pub fn decode_position(&self, pos: Point3<i32>) -> Point3<f64> {
        let pos_f64 = pos.map(f64::from).coords;
        (self.offset + pos_f64.component_mul(&self.scale)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::{CoordinateSystem, CoordinateSystemError};
    use nalgebra::{Point3, Vector3};

    #[test]
    fn int_position_encode_decode_las() {
        let coordinate_system = CoordinateSystem::from_las_transform(
            Vector3::new(0.01, 0.01, 0.01),
            Vector3::new(5.0, 5.0, 5.0),
        );

        // encode
        let p = coordinate_system
            .encode_position(Point3::new(4.0, 5.2, 6.01))
            .unwrap();
        assert_eq!(p, Point3::new(-100, 20, 101));

        // decode
        let global = coordinate_system.decode_position(Point3::new(-200, 1, 2));
        assert_eq!(global, Point3::new(3.0, 5.01, 5.02));
    }

    #[test]
    fn test_out_of_bounds() {
        let coordinate_system = CoordinateSystem::from_las_transform(
            Vector3::new(0.001, 0.001, 0.001),
            Vector3::new(0.0, 0.0, 0.0),
        );
        assert_eq!(
            coordinate_system.encode_position(Point3::new(0.0, 3.0e6, 0.0)),
            Err(CoordinateSystemError::OutOfBounds)
        );
        let identity = CoordinateSystem::new_identity();
        assert_eq!(
            identity.encode_position(Point3::new(1.0, -2.0, 3.0)),
            Ok(Point3::new(1, -2, 3))
        );
    }
}
