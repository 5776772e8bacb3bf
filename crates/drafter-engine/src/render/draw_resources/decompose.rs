//! Shape → cage decomposition.
//!
//! Each routine uploads as many whole elements as the draw-object, index and
//! geometry budgets allow at once, starting at `cursor`, and returns the
//! advanced cursor. A cursor that stops short of the element count means the
//! batch is full and the caller must flush before resuming.

use crate::geometry::{
    DrawObject, HatchSource, ObjectType, PolylineSource, SectionInfo, SectionKind,
    CONNECTOR_SIZE, CURVE_BOX_SIZE, LINE_POINT_SIZE, QUAD_BEZIER_SIZE,
};

use super::config::INDICES_PER_CAGE;
use super::staging::{GeometryArena, StagingArray};

/// Draw objects + geometry heap of the batch being filled.
#[derive(Debug)]
pub(crate) struct CageBatch {
    pub(crate) draw_objects: StagingArray<DrawObject>,
    pub(crate) geometry: GeometryArena,
    max_indices: u32,
}

impl CageBatch {
    pub(crate) fn new(max_draw_objects: u32, max_indices: u32, geometry: GeometryArena) -> Self {
        Self {
            draw_objects: StagingArray::new(max_draw_objects),
            geometry,
            max_indices,
        }
    }

    /// Cages the index buffer can still address this batch.
    #[inline]
    fn remaining_index_cages(&self) -> u32 {
        (self.max_indices / INDICES_PER_CAGE).saturating_sub(self.draw_objects.len())
    }

    /// Whole elements of `cages_per_object` cages that fit every budget, given
    /// that the geometry heap can hold `geometry_entries` more of them.
    fn uploadable(&self, cages_per_object: u32, geometry_entries: u64) -> u32 {
        let cage_slots = self.draw_objects.remaining().min(self.remaining_index_cages());
        let by_cages = cage_slots / cages_per_object;
        by_cages.min(geometry_entries.min(u32::MAX as u64) as u32)
    }

    pub(crate) fn reset(&mut self) {
        self.draw_objects.reset();
        self.geometry.reset();
    }
}

/// Dispatches one polyline section to its decomposition routine.
pub(crate) fn add_section_objects<P: PolylineSource + ?Sized>(
    batch: &mut CageBatch,
    polyline: &P,
    section: &SectionInfo,
    cursor: u32,
    main_obj_idx: u32,
) -> u32 {
    match section.kind {
        SectionKind::Line => add_lines(batch, polyline, section, cursor, main_obj_idx),
        SectionKind::QuadBezier => add_quad_beziers(batch, polyline, section, cursor, main_obj_idx),
    }
}

/// A line's geometry spans two adjacent points, so `k` lines need `k + 1`.
pub(crate) fn add_lines<P: PolylineSource + ?Sized>(
    batch: &mut CageBatch,
    polyline: &P,
    section: &SectionInfo,
    cursor: u32,
    main_obj_idx: u32,
) -> u32 {
    debug_assert_eq!(section.kind, SectionKind::Line);

    let points = batch.geometry.remaining_entries(LINE_POINT_SIZE);
    let lines_fit = points.saturating_sub(1);
    let count = batch
        .uploadable(1, lines_fit)
        .min(section.count.saturating_sub(cursor));
    if count == 0 {
        return cursor;
    }

    let first = (section.index + cursor) as usize;
    let points = &polyline.line_points()[first..first + count as usize + 1];
    let Some(base) = batch.geometry.write(points) else {
        return cursor;
    };

    for i in 0..count as u64 {
        batch.draw_objects.push(DrawObject::new(
            ObjectType::Line,
            0,
            main_obj_idx,
            base + i * LINE_POINT_SIZE,
        ));
    }
    cursor + count
}

/// Each bezier becomes `CAGES_PER_QUAD_BEZIER` cages over one geometry entry.
pub(crate) fn add_quad_beziers<P: PolylineSource + ?Sized>(
    batch: &mut CageBatch,
    polyline: &P,
    section: &SectionInfo,
    cursor: u32,
    main_obj_idx: u32,
) -> u32 {
    debug_assert_eq!(section.kind, SectionKind::QuadBezier);

    let cages = ObjectType::QuadBezier.cages_per_object();
    let count = batch
        .uploadable(cages, batch.geometry.remaining_entries(QUAD_BEZIER_SIZE))
        .min(section.count.saturating_sub(cursor));
    if count == 0 {
        return cursor;
    }

    let first = (section.index + cursor) as usize;
    let beziers = &polyline.quad_beziers()[first..first + count as usize];
    let Some(base) = batch.geometry.write(beziers) else {
        return cursor;
    };

    for i in 0..count as u64 {
        let address = base + i * QUAD_BEZIER_SIZE;
        for sub in 0..cages as u16 {
            batch.draw_objects.push(DrawObject::new(
                ObjectType::QuadBezier,
                sub,
                main_obj_idx,
                address,
            ));
        }
    }
    cursor + count
}

pub(crate) fn add_polyline_connectors<P: PolylineSource + ?Sized>(
    batch: &mut CageBatch,
    polyline: &P,
    cursor: u32,
    main_obj_idx: u32,
) -> u32 {
    let connectors = polyline.connectors();
    let count = batch
        .uploadable(1, batch.geometry.remaining_entries(CONNECTOR_SIZE))
        .min((connectors.len() as u32).saturating_sub(cursor));
    if count == 0 {
        return cursor;
    }

    let first = cursor as usize;
    let Some(base) = batch.geometry.write(&connectors[first..first + count as usize]) else {
        return cursor;
    };

    for i in 0..count as u64 {
        batch.draw_objects.push(DrawObject::new(
            ObjectType::PolylineConnector,
            0,
            main_obj_idx,
            base + i * CONNECTOR_SIZE,
        ));
    }
    cursor + count
}

pub(crate) fn add_hatch_boxes<H: HatchSource + ?Sized>(
    batch: &mut CageBatch,
    hatch: &H,
    cursor: u32,
    main_obj_idx: u32,
) -> u32 {
    let count = batch
        .uploadable(1, batch.geometry.remaining_entries(CURVE_BOX_SIZE))
        .min(hatch.hatch_box_count().saturating_sub(cursor));

    for i in 0..count {
        let hatch_box = hatch.hatch_box_at(cursor + i);
        let Some(address) = batch.geometry.write(std::slice::from_ref(hatch_box)) else {
            return cursor + i;
        };
        batch.draw_objects.push(DrawObject::new(
            ObjectType::CurveBox,
            0,
            main_obj_idx,
            address,
        ));
    }
    cursor + count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{
        CurveBox, Hatch, Polyline, PolylineConnector, QuadraticBezierInfo, CAGES_PER_QUAD_BEZIER,
    };

    fn batch(draw_objects: u32, geometry_bytes: u64) -> CageBatch {
        CageBatch::new(
            draw_objects,
            draw_objects * INDICES_PER_CAGE,
            GeometryArena::new(geometry_bytes, 0x1000),
        )
    }

    fn strip(points: usize) -> Polyline {
        let pts: Vec<[f64; 2]> = (0..points).map(|i| [i as f64, 0.0]).collect();
        let mut p = Polyline::new();
        p.add_line_strip(&pts);
        p
    }

    // ── lines ─────────────────────────────────────────────────────────────

    #[test]
    fn lines_limited_by_draw_objects() {
        let p = strip(11);
        let mut b = batch(4, 4096);
        let cursor = add_lines(&mut b, &p, &p.section_at(0), 0, 0);
        assert_eq!(cursor, 4);
        assert_eq!(b.draw_objects.len(), 4);
        // Four lines read five points.
        assert_eq!(b.geometry.state().current, 5 * LINE_POINT_SIZE);
    }

    #[test]
    fn lines_limited_by_geometry_points_minus_one() {
        let p = strip(11);
        let mut b = batch(64, 4 * LINE_POINT_SIZE + 7);
        let cursor = add_lines(&mut b, &p, &p.section_at(0), 0, 0);
        assert_eq!(cursor, 3);
    }

    #[test]
    fn lines_limited_by_index_budget() {
        let p = strip(11);
        let mut b = CageBatch::new(64, 2 * INDICES_PER_CAGE, GeometryArena::new(4096, 0));
        assert_eq!(add_lines(&mut b, &p, &p.section_at(0), 0, 0), 2);
    }

    #[test]
    fn line_draw_objects_step_one_point_apart() {
        let p = strip(4);
        let mut b = batch(8, 4096);
        add_lines(&mut b, &p, &p.section_at(0), 0, 9);
        let addrs: Vec<u64> = b.draw_objects.as_slice().iter().map(|d| d.geometry_address).collect();
        assert_eq!(addrs, vec![0x1000, 0x1000 + LINE_POINT_SIZE, 0x1000 + 2 * LINE_POINT_SIZE]);
        assert!(b.draw_objects.as_slice().iter().all(|d| d.main_obj_index == 9));
    }

    #[test]
    fn lines_resume_from_cursor() {
        let p = strip(6);
        let mut b = batch(3, 4096);
        let cursor = add_lines(&mut b, &p, &p.section_at(0), 0, 0);
        assert_eq!(cursor, 3);
        b.reset();
        let cursor = add_lines(&mut b, &p, &p.section_at(0), cursor, 0);
        assert_eq!(cursor, 5);
        // Second batch starts at point 3.
        let first: &[u8] = &b.geometry.bytes()[..LINE_POINT_SIZE as usize];
        assert_eq!(first, bytemuck::bytes_of(&p.line_points()[3]));
    }

    // ── beziers ───────────────────────────────────────────────────────────

    #[test]
    fn bezier_expands_into_cages_sharing_geometry() {
        let mut p = Polyline::new();
        p.add_quad_beziers(&[QuadraticBezierInfo::new([0.0, 0.0], [1.0, 1.0], [2.0, 0.0]); 2]);
        let mut b = batch(16, 4096);
        let cursor = add_quad_beziers(&mut b, &p, &p.section_at(0), 0, 0);
        assert_eq!(cursor, 2);

        let objs = b.draw_objects.as_slice();
        assert_eq!(objs.len() as u32, 2 * CAGES_PER_QUAD_BEZIER);
        for (i, obj) in objs.iter().enumerate() {
            let bezier = i as u64 / CAGES_PER_QUAD_BEZIER as u64;
            assert_eq!(obj.object_type(), ObjectType::QuadBezier as u16);
            assert_eq!(obj.sub_index() as u32, i as u32 % CAGES_PER_QUAD_BEZIER);
            assert_eq!(obj.geometry_address, 0x1000 + bezier * QUAD_BEZIER_SIZE);
        }
    }

    #[test]
    fn bezier_needs_whole_cage_group() {
        let mut p = Polyline::new();
        p.add_quad_beziers(&[QuadraticBezierInfo::default(); 2]);
        let mut b = batch(5, 4096);
        assert_eq!(add_quad_beziers(&mut b, &p, &p.section_at(0), 0, 0), 1);
        assert_eq!(b.draw_objects.len(), 3);
    }

    // ── connectors ────────────────────────────────────────────────────────

    #[test]
    fn connectors_map_one_to_one() {
        let mut p = strip(2);
        for _ in 0..3 {
            p.add_connector(PolylineConnector::default());
        }
        let mut b = batch(2, 4096);
        assert_eq!(add_polyline_connectors(&mut b, &p, 0, 0), 2);
        b.reset();
        assert_eq!(add_polyline_connectors(&mut b, &p, 2, 0), 3);
        assert_eq!(b.draw_objects.as_slice()[0].object_type(), ObjectType::PolylineConnector as u16);
    }

    // ── hatch boxes ───────────────────────────────────────────────────────

    #[test]
    fn hatch_boxes_resume_without_skip_or_duplicate() {
        let boxes: Vec<CurveBox> = (0..5)
            .map(|i| CurveBox { aabb_min: [i as f64, 0.0], ..CurveBox::default() })
            .collect();
        let hatch = Hatch::new(boxes);
        let mut b = batch(2, 4096);

        let mut seen = Vec::new();
        let mut cursor = 0;
        while cursor < hatch.hatch_box_count() {
            cursor = add_hatch_boxes(&mut b, &hatch, cursor, 0);
            for chunk in b.geometry.bytes().chunks(CURVE_BOX_SIZE as usize) {
                let cb: CurveBox = bytemuck::pod_read_unaligned(chunk);
                seen.push(cb.aabb_min[0] as u32);
            }
            b.reset();
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn full_batch_makes_no_progress() {
        let hatch = Hatch::rect([0.0, 0.0], [1.0, 1.0]);
        let mut b = batch(4, CURVE_BOX_SIZE - 1);
        assert_eq!(add_hatch_boxes(&mut b, &hatch, 0, 0), 0);
        assert_eq!(b.draw_objects.len(), 0);
    }
}
