//! Orientation state and the precomputed orientation vertex table.
//!
//! The correction pass draws one full-screen quad whose texture coordinates
//! are permuted per orientation, so the image is rotated and flipped by the
//! sampler instead of by a CPU-side copy. All eight variants share the same
//! topology (two triangles, indices `0,1,3` and `1,2,3`); only the vertex
//! data differs.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Floats per vertex: position (x, y, z) followed by texture coordinate (u, v).
pub const FLOATS_PER_VERTEX: usize = 5;

/// Vertices per quad.
pub const VERTICES_PER_QUAD: usize = 4;

/// One table entry: a quad of interleaved position/texcoord vertices.
pub type QuadVertices = [f32; FLOATS_PER_VERTEX * VERTICES_PER_QUAD];

/// Index buffer shared by every table entry.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

/// Image rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Parses a rotation given in degrees.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidRotation` for anything other than
    /// 0, 90, 180 or 270.
    pub fn from_degrees(degrees: u32) -> Result<Self, RenderError> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(RenderError::InvalidRotation(other)),
        }
    }

    pub fn degrees(self) -> u32 {
        self.index() as u32 * 90
    }

    /// Column of this rotation in the vertex table.
    pub fn index(self) -> usize {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }
}

impl TryFrom<u32> for Rotation {
    type Error = RenderError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> u32 {
        rotation.degrees()
    }
}

/// Rotation plus an independent vertical flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub rotation: Rotation,
    pub y_flip: bool,
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation {
        rotation: Rotation::Deg0,
        y_flip: false,
    };

    pub fn new(rotation: Rotation, y_flip: bool) -> Self {
        Self { rotation, y_flip }
    }

    /// Whether the correction pass can be skipped entirely.
    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }

    /// The vertex table entry for this orientation.
    pub fn vertices(self) -> &'static QuadVertices {
        &VERTEX_TABLE[usize::from(self.y_flip)][self.rotation.index()]
    }
}

/// Quad vertices indexed by `[y_flip][rotation]`.
///
/// Each row is `x, y, z, u, v`. Positions are listed top-right, bottom-right,
/// bottom-left, top-left; the flipped half swaps the vertical positions.
#[rustfmt::skip]
pub static VERTEX_TABLE: [[QuadVertices; 4]; 2] = [
    [
        [
             1.0,  1.0, 0.0, 1.0, 0.0,
             1.0, -1.0, 0.0, 1.0, 1.0,
            -1.0, -1.0, 0.0, 0.0, 1.0,
            -1.0,  1.0, 0.0, 0.0, 0.0,
        ],
        [
             1.0,  1.0, 0.0, 0.0, 0.0,
             1.0, -1.0, 0.0, 1.0, 0.0,
            -1.0, -1.0, 0.0, 1.0, 1.0,
            -1.0,  1.0, 0.0, 0.0, 1.0,
        ],
        [
             1.0,  1.0, 0.0, 0.0, 1.0,
             1.0, -1.0, 0.0, 0.0, 0.0,
            -1.0, -1.0, 0.0, 1.0, 0.0,
            -1.0,  1.0, 0.0, 1.0, 1.0,
        ],
        [
             1.0,  1.0, 0.0, 1.0, 1.0,
             1.0, -1.0, 0.0, 0.0, 1.0,
            -1.0, -1.0, 0.0, 0.0, 0.0,
            -1.0,  1.0, 0.0, 1.0, 0.0,
        ],
    ],
    [
        [
             1.0, -1.0, 0.0, 1.0, 1.0,
             1.0,  1.0, 0.0, 1.0, 0.0,
            -1.0,  1.0, 0.0, 0.0, 0.0,
            -1.0, -1.0, 0.0, 0.0, 1.0,
        ],
        [
             1.0, -1.0, 0.0, 1.0, 0.0,
             1.0,  1.0, 0.0, 0.0, 0.0,
            -1.0,  1.0, 0.0, 0.0, 1.0,
            -1.0, -1.0, 0.0, 1.0, 1.0,
        ],
        [
             1.0, -1.0, 0.0, 0.0, 0.0,
             1.0,  1.0, 0.0, 0.0, 1.0,
            -1.0,  1.0, 0.0, 1.0, 1.0,
            -1.0, -1.0, 0.0, 1.0, 0.0,
        ],
        [
             1.0, -1.0, 0.0, 0.0, 1.0,
             1.0,  1.0, 0.0, 1.0, 1.0,
            -1.0,  1.0, 0.0, 1.0, 0.0,
            -1.0, -1.0, 0.0, 0.0, 0.0,
        ],
    ],
];
