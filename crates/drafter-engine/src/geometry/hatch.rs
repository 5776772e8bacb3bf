use super::records::CurveBox;

/// Shape source consumed by `DrawResourcesFiller::draw_hatch`.
pub trait HatchSource {
    fn hatch_box_count(&self) -> u32;
    fn hatch_box_at(&self, i: u32) -> &CurveBox;
}

/// Hatch fill already decomposed into curve boxes.
///
/// Building the boxes from boundary curves happens upstream; the filler only
/// streams them.
#[derive(Debug, Clone, Default)]
pub struct Hatch {
    boxes: Vec<CurveBox>,
}

impl Hatch {
    pub fn new(boxes: Vec<CurveBox>) -> Self {
        Self { boxes }
    }

    pub fn push(&mut self, hatch_box: CurveBox) {
        self.boxes.push(hatch_box);
    }

    /// Axis-aligned rectangle as a single straight-sided box.
    pub fn rect(min: [f64; 2], max: [f64; 2]) -> Self {
        Self::new(vec![CurveBox {
            aabb_min: min,
            aabb_max: max,
            curve_min: [[0.0, 0.0], [0.0, 0.5], [0.0, 1.0]],
            curve_max: [[1.0, 0.0], [1.0, 0.5], [1.0, 1.0]],
        }])
    }

    pub fn boxes(&self) -> &[CurveBox] {
        &self.boxes
    }
}

impl HatchSource for Hatch {
    fn hatch_box_count(&self) -> u32 {
        self.boxes.len() as u32
    }

    fn hatch_box_at(&self, i: u32) -> &CurveBox {
        &self.boxes[i as usize]
    }
}
