/// Represents an axis-aligned cubic region in 3D space.
///
/// This structure defines the boundaries of a tree cell. Each `Cube` has a
/// geometric center and a half-size, which is half the length of one side.
///
/// # Examples
///
/// ```
/// use gravtree::Cube;
///
/// // Create a cube with center at the origin and side length of 2.0.
/// let cube = Cube { center: [0.0; 3], half_size: 1.0 };
///
/// // Check if a point is inside the cube.
/// assert!(cube.contains(&[0.5, 0.5, -0.5]));
/// assert!(!cube.contains(&[1.5, 0.5, 0.0])); // Outside the cube.
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Cube {
    /// Geometric center of the cell.
    pub center: [f64; 3],
    /// Half the length of one side.
    pub half_size: f64,
}

impl Cube {
    /// Returns true if the point is inside this cube.
    ///
    /// The boundary is inclusive on the lower faces and exclusive on the
    /// upper faces, which avoids ambiguity for points sitting exactly on a
    /// subdivision plane.
    pub fn contains(&self, p: &[f64; 3]) -> bool {
        (0..3).all(|k| {
            p[k] >= self.center[k] - self.half_size && p[k] < self.center[k] + self.half_size
        })
    }

    /// Returns the octant index (0..8) that the point falls into.
    ///
    /// Bit `k` of the index is set when coordinate `k` of the point is at or
    /// above the cube center, so the mapping is total: any point, inside the
    /// cube or not, is assigned an octant.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravtree::Cube;
    ///
    /// let cube = Cube { center: [0.0; 3], half_size: 1.0 };
    /// assert_eq!(cube.octant_of(&[0.5, -0.5, 0.5]), 0b101);
    /// assert_eq!(cube.octant_of(&[-0.5, -0.5, -0.5]), 0);
    /// ```
    pub fn octant_of(&self, p: &[f64; 3]) -> usize {
        let mut o = 0;
        for k in 0..3 {
            if p[k] >= self.center[k] {
                o |= 1 << k;
            }
        }
        o
    }

    /// Returns the sub-cube covering octant `o` of this cube.
    ///
    /// Together with [`Cube::octant_of`] this is the key subdivision step of
    /// the octree: a cell splits into eight children of half its side length.
    pub fn octant(&self, o: usize) -> Cube {
        let hs = self.half_size / 2.0;
        let mut center = self.center;
        for k in 0..3 {
            if o & (1 << k) != 0 {
                center[k] += hs;
            } else {
                center[k] -= hs;
            }
        }
        Cube { center, half_size: hs }
    }

    /// Returns the smallest padded cube enclosing every point.
    ///
    /// The cube is centered on the midpoint of the coordinate span and its
    /// half-size is padded by one part in 10^12 so points lying exactly on
    /// the upper faces still satisfy the half-open [`Cube::contains`] test.
    /// An empty slice yields a degenerate cube at the origin.
    pub fn bounding(points: &[[f64; 3]]) -> Cube {
        if points.is_empty() {
            return Cube { center: [0.0; 3], half_size: 0.0 };
        }

        let mut low = points[0];
        let mut high = points[0];
        for p in &points[1..] {
            for k in 0..3 {
                if p[k] < low[k] {
                    low[k] = p[k];
                } else if p[k] > high[k] {
                    high[k] = p[k];
                }
            }
        }

        let mut center = [0.0; 3];
        let mut half_size: f64 = 0.0;
        for k in 0..3 {
            center[k] = 0.5 * (low[k] + high[k]);
            half_size = half_size.max(0.5 * (high[k] - low[k]));
        }

        Cube { center, half_size: half_size * (1.0 + 1e-12) }
    }
}
