//! Tree kinds cached per mesh.

use std::fmt;

use serde::{Deserialize, Serialize};
use vcad_kernel_bvhtree::BvhParams;

/// Primitive a tree is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// Mesh vertices or point cloud points.
    Vert,
    /// Mesh edges.
    Edge,
    /// Corner triangles of the face triangulation.
    Tri,
}

/// The fixed set of trees a [`Mesh`](crate::Mesh) can cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeKind {
    /// All vertices.
    Verts,
    /// All edges.
    Edges,
    /// All corner triangles.
    CornerTris,
    /// Triangles of faces that are not hidden.
    CornerTrisNoHidden,
    /// Vertices not used by any edge.
    LooseVerts,
    /// Edges not used by any face.
    LooseEdges,
    /// Vertices not used by any visible edge, and not hidden themselves.
    LooseVertsNoHidden,
    /// Edges not used by any visible face, and not hidden themselves.
    LooseEdgesNoHidden,
}

impl TreeKind {
    /// Number of kinds.
    pub const COUNT: usize = 8;

    /// Every kind, in cache slot order.
    pub const ALL: [TreeKind; Self::COUNT] = [
        TreeKind::Verts,
        TreeKind::Edges,
        TreeKind::CornerTris,
        TreeKind::CornerTrisNoHidden,
        TreeKind::LooseVerts,
        TreeKind::LooseEdges,
        TreeKind::LooseVertsNoHidden,
        TreeKind::LooseEdgesNoHidden,
    ];

    /// Cache slot of this kind.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Primitive the kind's tree is built over.
    pub fn primitive(self) -> PrimitiveKind {
        match self {
            TreeKind::Verts | TreeKind::LooseVerts | TreeKind::LooseVertsNoHidden => PrimitiveKind::Vert,
            TreeKind::Edges | TreeKind::LooseEdges | TreeKind::LooseEdgesNoHidden => PrimitiveKind::Edge,
            TreeKind::CornerTris | TreeKind::CornerTrisNoHidden => PrimitiveKind::Tri,
        }
    }

    /// Build parameters used for the cached tree.
    pub fn params(self) -> BvhParams {
        match self.primitive() {
            PrimitiveKind::Tri => BvhParams::triangles(),
            PrimitiveKind::Vert | PrimitiveKind::Edge => BvhParams::default(),
        }
    }

    /// True if hidden elements are excluded.
    pub fn skips_hidden(self) -> bool {
        matches!(
            self,
            TreeKind::CornerTrisNoHidden | TreeKind::LooseVertsNoHidden | TreeKind::LooseEdgesNoHidden
        )
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TreeKind::Verts => "verts",
            TreeKind::Edges => "edges",
            TreeKind::CornerTris => "corner_tris",
            TreeKind::CornerTrisNoHidden => "corner_tris_no_hidden",
            TreeKind::LooseVerts => "loose_verts",
            TreeKind::LooseEdges => "loose_edges",
            TreeKind::LooseVertsNoHidden => "loose_verts_no_hidden",
            TreeKind::LooseEdgesNoHidden => "loose_edges_no_hidden",
        };
        f.write_str(name)
    }
}
