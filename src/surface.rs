//! Surface providers exposing closest-point projection.

use crate::error::CpmError;

/// A closed manifold embedded in R^2 or R^3.
///
/// The only geometric query the closest point method needs is the
/// projection of an arbitrary embedding-space point onto the surface,
/// plus a bounding box to lay the virtual grid over.
pub trait Surface: Sync {
  /// Embedding dimension (2 or 3).
  fn dim(&self) -> usize;

  /// Closest point on the surface and the distance to it.
  fn closest_point(&self, point: na::DVectorView<f64>) -> (na::DVector<f64>, f64);

  /// Axis-aligned bounding box `(lo, hi)` of the surface.
  fn bounding_box(&self) -> (na::DVector<f64>, na::DVector<f64>);
}

/// Circle of radius `r` around a center, in R^2.
#[derive(Debug, Clone)]
pub struct Circle {
  center: na::Vector2<f64>,
  radius: f64,
}

impl Circle {
  pub fn new(center: na::Vector2<f64>, radius: f64) -> Self {
    assert!(radius > 0.0);
    Self { center, radius }
  }
  pub fn unit() -> Self {
    Self::new(na::Vector2::zeros(), 1.0)
  }

  /// Uniformly spaced sample points on the circle and their angles.
  pub fn parametric_grid(&self, n: usize) -> (na::DMatrix<f64>, na::DVector<f64>) {
    let angles =
      na::DVector::from_iterator(n, (0..n).map(|i| 2.0 * std::f64::consts::PI * i as f64 / n as f64));
    let mut points = na::DMatrix::zeros(2, n);
    for (i, &theta) in angles.iter().enumerate() {
      points[(0, i)] = self.center.x + self.radius * theta.cos();
      points[(1, i)] = self.center.y + self.radius * theta.sin();
    }
    (points, angles)
  }
}

impl Surface for Circle {
  fn dim(&self) -> usize {
    2
  }

  fn closest_point(&self, point: na::DVectorView<f64>) -> (na::DVector<f64>, f64) {
    let rel = na::Vector2::new(point[0], point[1]) - self.center;
    let dist = rel.norm();
    // center projects to an arbitrary fixed point on the circle
    let dir = if dist > 0.0 {
      rel / dist
    } else {
      na::Vector2::x()
    };
    let cp = self.center + self.radius * dir;
    (na::dvector![cp.x, cp.y], (dist - self.radius).abs())
  }

  fn bounding_box(&self) -> (na::DVector<f64>, na::DVector<f64>) {
    let r = na::dvector![self.radius, self.radius];
    let c = na::dvector![self.center.x, self.center.y];
    (&c - &r, &c + &r)
  }
}

/// Sphere of radius `r` around a center, in R^3.
#[derive(Debug, Clone)]
pub struct Sphere {
  center: na::Vector3<f64>,
  radius: f64,
}

impl Sphere {
  pub fn new(center: na::Vector3<f64>, radius: f64) -> Self {
    assert!(radius > 0.0);
    Self { center, radius }
  }
  pub fn unit() -> Self {
    Self::new(na::Vector3::zeros(), 1.0)
  }

  /// Longitude/latitude sample grid on the sphere.
  ///
  /// Returns the sample points as matrix columns together with the
  /// latitude of each sample, which parameterizes the exact solution
  /// `exp(-2t) sin(latitude)` of heat flow started from `u0 = z`.
  pub fn parametric_grid(&self, nlon: usize, nlat: usize) -> (na::DMatrix<f64>, na::DVector<f64>) {
    use std::f64::consts::PI;
    let n = nlon * nlat;
    let mut points = na::DMatrix::zeros(3, n);
    let mut latitudes = na::DVector::zeros(n);
    for ilon in 0..nlon {
      let lon = -PI + 2.0 * PI * ilon as f64 / nlon as f64;
      for ilat in 0..nlat {
        let lat = -PI / 2.0 + PI * ilat as f64 / (nlat - 1) as f64;
        let i = ilon * nlat + ilat;
        points[(0, i)] = self.center.x + self.radius * lon.cos() * lat.cos();
        points[(1, i)] = self.center.y + self.radius * lon.sin() * lat.cos();
        points[(2, i)] = self.center.z + self.radius * lat.sin();
        latitudes[i] = lat;
      }
    }
    (points, latitudes)
  }
}

impl Surface for Sphere {
  fn dim(&self) -> usize {
    3
  }

  fn closest_point(&self, point: na::DVectorView<f64>) -> (na::DVector<f64>, f64) {
    let rel = na::Vector3::new(point[0], point[1], point[2]) - self.center;
    let dist = rel.norm();
    let dir = if dist > 0.0 {
      rel / dist
    } else {
      na::Vector3::x()
    };
    let cp = self.center + self.radius * dir;
    (na::dvector![cp.x, cp.y, cp.z], (dist - self.radius).abs())
  }

  fn bounding_box(&self) -> (na::DVector<f64>, na::DVector<f64>) {
    let r = na::dvector![self.radius, self.radius, self.radius];
    let c = na::dvector![self.center.x, self.center.y, self.center.z];
    (&c - &r, &c + &r)
  }
}

/// Triangulated surface from in-memory vertex and face arrays.
///
/// File parsing is out of scope; loaders hand over `(vertices, faces)`
/// and this type answers closest-point queries by exact point-triangle
/// projection minimized over all faces.
#[derive(Debug, Clone)]
pub struct TriMesh {
  vertices: na::Matrix3xX<f64>,
  faces: Vec<[usize; 3]>,
}

impl TriMesh {
  pub fn new(vertices: na::Matrix3xX<f64>, faces: Vec<[usize; 3]>) -> Result<Self, CpmError> {
    if vertices.ncols() == 0 || faces.is_empty() {
      return Err(CpmError::config("empty mesh"));
    }
    let nvertices = vertices.ncols();
    for face in &faces {
      if face.iter().any(|&v| v >= nvertices) {
        return Err(CpmError::config(format!(
          "face {face:?} references vertex out of range (nvertices={nvertices})"
        )));
      }
      let [a, b, c] = face.map(|v| vertices.column(v).into_owned());
      if (b - &a).cross(&(c - &a)).norm() == 0.0 {
        return Err(CpmError::config(format!("degenerate face {face:?}")));
      }
    }
    Ok(Self { vertices, faces })
  }

  pub fn vertices(&self) -> &na::Matrix3xX<f64> {
    &self.vertices
  }
  pub fn faces(&self) -> &[[usize; 3]] {
    &self.faces
  }
}

impl Surface for TriMesh {
  fn dim(&self) -> usize {
    3
  }

  fn closest_point(&self, point: na::DVectorView<f64>) -> (na::DVector<f64>, f64) {
    let p = na::Vector3::new(point[0], point[1], point[2]);
    let mut best = na::Vector3::zeros();
    let mut best_dist = f64::INFINITY;
    for face in &self.faces {
      let [a, b, c] = face.map(|v| self.vertices.column(v).into_owned());
      let q = closest_point_on_triangle(&p, &a, &b, &c);
      let dist = (q - p).norm();
      if dist < best_dist {
        best_dist = dist;
        best = q;
      }
    }
    (na::dvector![best.x, best.y, best.z], best_dist)
  }

  fn bounding_box(&self) -> (na::DVector<f64>, na::DVector<f64>) {
    let mut lo = na::dvector![f64::INFINITY, f64::INFINITY, f64::INFINITY];
    let mut hi = na::dvector![f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    for v in self.vertices.column_iter() {
      for axis in 0..3 {
        lo[axis] = lo[axis].min(v[axis]);
        hi[axis] = hi[axis].max(v[axis]);
      }
    }
    (lo, hi)
  }
}

/// Closest point on triangle `(a, b, c)` to `p`, via the barycentric
/// region classification of Ericson, Real-Time Collision Detection §5.1.5.
fn closest_point_on_triangle(
  p: &na::Vector3<f64>,
  a: &na::Vector3<f64>,
  b: &na::Vector3<f64>,
  c: &na::Vector3<f64>,
) -> na::Vector3<f64> {
  let ab = b - a;
  let ac = c - a;
  let ap = p - a;

  let d1 = ab.dot(&ap);
  let d2 = ac.dot(&ap);
  if d1 <= 0.0 && d2 <= 0.0 {
    return *a;
  }

  let bp = p - b;
  let d3 = ab.dot(&bp);
  let d4 = ac.dot(&bp);
  if d3 >= 0.0 && d4 <= d3 {
    return *b;
  }

  let vc = d1 * d4 - d3 * d2;
  if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
    let v = d1 / (d1 - d3);
    return a + v * ab;
  }

  let cp = p - c;
  let d5 = ab.dot(&cp);
  let d6 = ac.dot(&cp);
  if d6 >= 0.0 && d5 <= d6 {
    return *c;
  }

  let vb = d5 * d2 - d1 * d6;
  if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
    let w = d2 / (d2 - d6);
    return a + w * ac;
  }

  let va = d3 * d6 - d5 * d4;
  if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
    let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
    return b + w * (c - b);
  }

  let denom = 1.0 / (va + vb + vc);
  let v = vb * denom;
  let w = vc * denom;
  a + v * ab + w * ac
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn sphere_projects_radially() {
    let sphere = Sphere::unit();
    let p = na::dvector![2.0, 0.0, 0.0];
    let (cp, dist) = sphere.closest_point(p.as_view());
    assert_relative_eq!(cp, na::dvector![1.0, 0.0, 0.0]);
    assert_relative_eq!(dist, 1.0);

    let inside = na::dvector![0.0, 0.25, 0.0];
    let (cp, dist) = sphere.closest_point(inside.as_view());
    assert_relative_eq!(cp, na::dvector![0.0, 1.0, 0.0]);
    assert_relative_eq!(dist, 0.75);
  }

  #[test]
  fn circle_center_query_is_defined() {
    let circle = Circle::unit();
    let center = na::dvector![0.0, 0.0];
    let (cp, dist) = circle.closest_point(center.as_view());
    assert_relative_eq!(cp.norm(), 1.0);
    assert_relative_eq!(dist, 1.0);
  }

  fn single_triangle() -> TriMesh {
    let vertices = na::Matrix3xX::from_columns(&[
      na::Vector3::new(0.0, 0.0, 0.0),
      na::Vector3::new(1.0, 0.0, 0.0),
      na::Vector3::new(0.0, 1.0, 0.0),
    ]);
    TriMesh::new(vertices, vec![[0, 1, 2]]).unwrap()
  }

  #[test]
  fn triangle_face_projection() {
    let mesh = single_triangle();
    let above = na::dvector![0.25, 0.25, 1.0];
    let (cp, dist) = mesh.closest_point(above.as_view());
    assert_relative_eq!(cp, na::dvector![0.25, 0.25, 0.0]);
    assert_relative_eq!(dist, 1.0);
  }

  #[test]
  fn triangle_vertex_and_edge_regions() {
    let mesh = single_triangle();

    let beyond_a = na::dvector![-1.0, -1.0, 0.0];
    let (cp, _) = mesh.closest_point(beyond_a.as_view());
    assert_relative_eq!(cp, na::dvector![0.0, 0.0, 0.0]);

    let off_edge = na::dvector![0.5, -1.0, 0.0];
    let (cp, _) = mesh.closest_point(off_edge.as_view());
    assert_relative_eq!(cp, na::dvector![0.5, 0.0, 0.0]);
  }

  #[test]
  fn degenerate_mesh_is_rejected() {
    let vertices = na::Matrix3xX::from_columns(&[
      na::Vector3::new(0.0, 0.0, 0.0),
      na::Vector3::new(1.0, 0.0, 0.0),
      na::Vector3::new(2.0, 0.0, 0.0),
    ]);
    assert!(TriMesh::new(vertices, vec![[0, 1, 2]]).is_err());
  }
}
