use super::records::{LinePointInfo, ObjectType, PolylineConnector, QuadraticBezierInfo};

/// A run of same-kind elements inside a polyline.
///
/// For `Line` sections `index` points at the first vertex in
/// [`PolylineSource::line_points`] and `count` is the number of segments, so the
/// section reads `count + 1` vertices. For `QuadBezier` sections `index`/`count`
/// address [`PolylineSource::quad_beziers`] directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub kind: SectionKind,
    pub index: u32,
    pub count: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SectionKind {
    Line,
    QuadBezier,
}

impl SectionKind {
    #[inline]
    pub const fn object_type(self) -> ObjectType {
        match self {
            SectionKind::Line => ObjectType::Line,
            SectionKind::QuadBezier => ObjectType::QuadBezier,
        }
    }
}

/// Shape source consumed by `DrawResourcesFiller::draw_polyline`.
pub trait PolylineSource {
    fn section_count(&self) -> u32;
    fn section_at(&self, i: u32) -> SectionInfo;
    fn line_points(&self) -> &[LinePointInfo];
    fn quad_beziers(&self) -> &[QuadraticBezierInfo];
    fn connectors(&self) -> &[PolylineConnector];
}

/// Owned polyline built from line strips and bezier runs.
#[derive(Debug, Clone, Default)]
pub struct Polyline {
    sections: Vec<SectionInfo>,
    line_points: Vec<LinePointInfo>,
    quad_beziers: Vec<QuadraticBezierInfo>,
    connectors: Vec<PolylineConnector>,
}

impl Polyline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a connected line strip. Fewer than two points is a no-op.
    pub fn add_line_points(&mut self, points: &[LinePointInfo]) -> &mut Self {
        if points.len() < 2 {
            return self;
        }
        self.sections.push(SectionInfo {
            kind: SectionKind::Line,
            index: self.line_points.len() as u32,
            count: (points.len() - 1) as u32,
        });
        self.line_points.extend_from_slice(points);
        self
    }

    /// Convenience over [`add_line_points`](Self::add_line_points) for bare coordinates.
    pub fn add_line_strip(&mut self, points: &[[f64; 2]]) -> &mut Self {
        let points: Vec<LinePointInfo> = points
            .iter()
            .map(|p| LinePointInfo::new(p[0], p[1]))
            .collect();
        self.add_line_points(&points)
    }

    pub fn add_quad_beziers(&mut self, beziers: &[QuadraticBezierInfo]) -> &mut Self {
        if beziers.is_empty() {
            return self;
        }
        self.sections.push(SectionInfo {
            kind: SectionKind::QuadBezier,
            index: self.quad_beziers.len() as u32,
            count: beziers.len() as u32,
        });
        self.quad_beziers.extend_from_slice(beziers);
        self
    }

    pub fn add_connector(&mut self, connector: PolylineConnector) -> &mut Self {
        self.connectors.push(connector);
        self
    }

    /// Total number of cages this polyline expands into.
    pub fn cage_count(&self) -> u32 {
        let sections: u32 = self
            .sections
            .iter()
            .map(|s| s.count * s.kind.object_type().cages_per_object())
            .sum();
        sections + self.connectors.len() as u32
    }
}

impl PolylineSource for Polyline {
    fn section_count(&self) -> u32 {
        self.sections.len() as u32
    }

    fn section_at(&self, i: u32) -> SectionInfo {
        self.sections[i as usize]
    }

    fn line_points(&self) -> &[LinePointInfo] {
        &self.line_points
    }

    fn quad_beziers(&self) -> &[QuadraticBezierInfo] {
        &self.quad_beziers
    }

    fn connectors(&self) -> &[PolylineConnector] {
        &self.connectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_strip_records_segment_count() {
        let mut p = Polyline::new();
        p.add_line_strip(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
        assert_eq!(p.section_count(), 1);
        assert_eq!(
            p.section_at(0),
            SectionInfo { kind: SectionKind::Line, index: 0, count: 2 }
        );
        assert_eq!(p.line_points().len(), 3);
    }

    #[test]
    fn degenerate_strip_is_ignored() {
        let mut p = Polyline::new();
        p.add_line_strip(&[[0.0, 0.0]]);
        assert_eq!(p.section_count(), 0);
    }

    #[test]
    fn sections_index_into_their_own_arrays() {
        let mut p = Polyline::new();
        p.add_line_strip(&[[0.0, 0.0], [1.0, 0.0]])
            .add_quad_beziers(&[QuadraticBezierInfo::new([0.0, 0.0], [1.0, 1.0], [2.0, 0.0])])
            .add_line_strip(&[[5.0, 0.0], [6.0, 0.0], [7.0, 0.0]]);

        assert_eq!(p.section_at(1).index, 0);
        assert_eq!(p.section_at(2).index, 2);
        assert_eq!(p.section_at(2).count, 2);
        assert_eq!(p.cage_count(), 1 + 3 + 2);
    }
}
