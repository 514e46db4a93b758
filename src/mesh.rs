//! Resolution of boundary facets to integer boundary tags.
use hashbrown::HashMap;

pub type BoundaryTag = i32;

/// Owning element and the facet's local index within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundaryPrimitive {
    pub element: usize,
    pub local_index: usize,
}
impl BoundaryPrimitive {
    pub fn new(element: usize, local_index: usize) -> Self {
        Self {
            element,
            local_index,
        }
    }
}

pub trait TagResolver {
    fn resolve_tag(&self, element: usize, local_index: usize) -> BoundaryTag;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryPosition {
    Left,
    Lower,
    Right,
    Upper,
    Front,
    Back,
}
impl BoundaryPosition {
    pub const ALL: [BoundaryPosition; 6] = [
        BoundaryPosition::Left,
        BoundaryPosition::Lower,
        BoundaryPosition::Right,
        BoundaryPosition::Upper,
        BoundaryPosition::Front,
        BoundaryPosition::Back,
    ];
    /// x-min 1, y-min 2, x-max 3, y-max 4, z-min 5, z-max 6.
    pub fn tag(self) -> BoundaryTag {
        match self {
            BoundaryPosition::Left => 1,
            BoundaryPosition::Lower => 2,
            BoundaryPosition::Right => 3,
            BoundaryPosition::Upper => 4,
            BoundaryPosition::Front => 5,
            BoundaryPosition::Back => 6,
        }
    }
    fn axis(self) -> usize {
        match self {
            BoundaryPosition::Left | BoundaryPosition::Right => 0,
            BoundaryPosition::Lower | BoundaryPosition::Upper => 1,
            BoundaryPosition::Front | BoundaryPosition::Back => 2,
        }
    }
    fn is_max(self) -> bool {
        matches!(
            self,
            BoundaryPosition::Right | BoundaryPosition::Upper | BoundaryPosition::Back
        )
    }
}

/// Facet to tag lookup. Facets never inserted resolve to `default_tag`.
#[derive(Clone, Debug)]
pub struct FacetTags {
    tags: HashMap<BoundaryPrimitive, BoundaryTag>,
    default_tag: BoundaryTag,
}
impl FacetTags {
    pub fn new(default_tag: BoundaryTag) -> Self {
        Self {
            tags: HashMap::new(),
            default_tag,
        }
    }
    pub fn insert(&mut self, primitive: BoundaryPrimitive, tag: BoundaryTag) -> Option<BoundaryTag> {
        self.tags.insert(primitive, tag)
    }
    pub fn get(&self, primitive: &BoundaryPrimitive) -> Option<BoundaryTag> {
        self.tags.get(primitive).copied()
    }
    pub fn len(&self) -> usize {
        self.tags.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
    /// Tags facets whose centroid lies on a side of the centroids' bounding box. Flat axes are
    /// skipped. Returns the number of facets tagged.
    pub fn tag_bounding_box_sides(
        &mut self,
        facets: &[(BoundaryPrimitive, [f64; 3])],
        tol: f64,
    ) -> usize {
        if facets.is_empty() {
            return 0;
        }
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for (_, centroid) in facets {
            for d in 0..3 {
                min[d] = min[d].min(centroid[d]);
                max[d] = max[d].max(centroid[d]);
            }
        }
        let flat: [bool; 3] = std::array::from_fn(|d| max[d] - min[d] < tol);
        let mut tagged = 0;
        for (primitive, centroid) in facets {
            let side = BoundaryPosition::ALL.into_iter().find(|side| {
                let axis = side.axis();
                if flat[axis] {
                    return false;
                }
                let bound = if side.is_max() { max[axis] } else { min[axis] };
                (centroid[axis] - bound).abs() < tol
            });
            if let Some(side) = side {
                self.tags.insert(*primitive, side.tag());
                tagged += 1;
            }
        }
        log::debug!("tagged {tagged} of {} facets by bounding box side", facets.len());
        tagged
    }
}
impl TagResolver for FacetTags {
    fn resolve_tag(&self, element: usize, local_index: usize) -> BoundaryTag {
        self.tags
            .get(&BoundaryPrimitive::new(element, local_index))
            .copied()
            .unwrap_or(self.default_tag)
    }
}
