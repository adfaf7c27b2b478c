//! 2D geometry used by the shape recording API.
//!
//! [`Matrix`] wraps a column-major [`glam::Mat3`] but exposes the row-major
//! accessors (`scale_x`, `skew_x`, `trans_x`, ...) the drawing code is written
//! against.

use glam::{Mat3, Vec2, Vec3};
use std::ops::Mul;

/// Axis-aligned rectangle stored as edges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const EMPTY: Rect = Rect::from_ltrb(0.0, 0.0, 0.0, 0.0);

    pub const fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_ltrb(x, y, x + width, y + height)
    }

    /// Tight bounds of a point set. Returns [`Rect::EMPTY`] for no points.
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::EMPTY;
        };
        let (min, max) = points
            .iter()
            .skip(1)
            .fold((*first, *first), |(min, max), p| (min.min(*p), max.max(*p)));
        Self::from_ltrb(min.x, min.y, max.x, max.y)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        )
    }

    /// True if the rect has no area or is inverted (NaN edges included).
    pub fn is_empty(&self) -> bool {
        !(self.left < self.right && self.top < self.bottom)
    }

    pub fn area(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            self.width() * self.height()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
    }

    /// Strict overlap test: rects that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_ltrb(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn outset(&self, dx: f32, dy: f32) -> Rect {
        Rect::from_ltrb(
            self.left - dx,
            self.top - dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Inclusive containment with a small tolerance for float round-off.
    pub fn contains_point(&self, p: Vec2) -> bool {
        const EPS: f32 = 1e-3;
        p.x >= self.left - EPS
            && p.x <= self.right + EPS
            && p.y >= self.top - EPS
            && p.y <= self.bottom + EPS
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.left, self.top),
            Vec2::new(self.right, self.top),
            Vec2::new(self.right, self.bottom),
            Vec2::new(self.left, self.bottom),
        ]
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }
}

/// Round-rect corner, in radii storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft = 0,
    TopRight = 1,
    BottomRight = 2,
    BottomLeft = 3,
}

/// Classification of a round rect by how its radii relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RRectType {
    Empty,
    Rect,
    Oval,
    /// All corners share the same non-zero radii.
    Simple,
    /// Radii are axis aligned: left corners share x, top corners share y, and so on.
    NinePatch,
    Complex,
}

/// Rectangle with per-corner elliptical radii.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RRect {
    rect: Rect,
    radii: [Vec2; 4],
    ty: RRectType,
}

impl RRect {
    pub fn new_rect(rect: Rect) -> Self {
        Self::new_rect_radii(rect, [Vec2::ZERO; 4])
    }

    pub fn new_oval(oval: Rect) -> Self {
        let r = Vec2::new(oval.width() * 0.5, oval.height() * 0.5);
        Self::new_rect_radii(oval, [r; 4])
    }

    pub fn new_rect_xy(rect: Rect, rx: f32, ry: f32) -> Self {
        Self::new_rect_radii(rect, [Vec2::new(rx, ry); 4])
    }

    pub fn new_nine_patch(rect: Rect, left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new_rect_radii(
            rect,
            [
                Vec2::new(left, top),
                Vec2::new(right, top),
                Vec2::new(right, bottom),
                Vec2::new(left, bottom),
            ],
        )
    }

    /// Builds a round rect from per-corner radii in [`Corner`] order.
    ///
    /// Negative or non-finite radii are treated as zero, a corner with one zero
    /// component is squared off, and all radii are scaled down uniformly if
    /// adjacent corners would overlap.
    pub fn new_rect_radii(rect: Rect, radii: [Vec2; 4]) -> Self {
        let rect = Rect::from_ltrb(
            rect.left.min(rect.right),
            rect.top.min(rect.bottom),
            rect.left.max(rect.right),
            rect.top.max(rect.bottom),
        );
        if rect.is_empty() || !rect.is_finite() {
            return Self {
                rect,
                radii: [Vec2::ZERO; 4],
                ty: RRectType::Empty,
            };
        }

        let mut radii = radii.map(|r| {
            if !r.is_finite() || r.x <= 0.0 || r.y <= 0.0 {
                Vec2::ZERO
            } else {
                r
            }
        });

        let w = rect.width();
        let h = rect.height();
        let tl = Corner::TopLeft as usize;
        let tr = Corner::TopRight as usize;
        let br = Corner::BottomRight as usize;
        let bl = Corner::BottomLeft as usize;
        let scale = [
            w / (radii[tl].x + radii[tr].x),
            h / (radii[tr].y + radii[br].y),
            w / (radii[br].x + radii[bl].x),
            h / (radii[bl].y + radii[tl].y),
        ]
        .into_iter()
        .filter(|s| s.is_finite())
        .fold(1.0f32, f32::min);
        if scale < 1.0 {
            for r in &mut radii {
                *r *= scale;
            }
        }

        let mut rrect = Self {
            rect,
            radii,
            ty: RRectType::Empty,
        };
        rrect.ty = rrect.classify();
        rrect
    }

    fn classify(&self) -> RRectType {
        let [tl, tr, br, bl] = self.radii;
        if self.radii.iter().all(|r| *r == Vec2::ZERO) {
            return RRectType::Rect;
        }
        if tl == tr && tl == br && tl == bl {
            let half = Vec2::new(self.rect.width() * 0.5, self.rect.height() * 0.5);
            if (tl - half).abs().max_element() <= f32::EPSILON * half.max_element().max(1.0) {
                return RRectType::Oval;
            }
            return RRectType::Simple;
        }
        if tl.x == bl.x && tl.y == tr.y && tr.x == br.x && bl.y == br.y {
            return RRectType::NinePatch;
        }
        RRectType::Complex
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn radii(&self, corner: Corner) -> Vec2 {
        self.radii[corner as usize]
    }

    /// Radii shared by all corners; only meaningful for simple round rects and ovals.
    pub fn simple_radii(&self) -> Vec2 {
        self.radii[Corner::TopLeft as usize]
    }

    pub fn ty(&self) -> RRectType {
        self.ty
    }

    pub fn is_empty(&self) -> bool {
        self.ty == RRectType::Empty
    }

    pub fn is_rect(&self) -> bool {
        self.ty == RRectType::Rect
    }

    pub fn is_oval(&self) -> bool {
        self.ty == RRectType::Oval
    }

    pub fn is_simple(&self) -> bool {
        self.ty == RRectType::Simple
    }

    pub fn width(&self) -> f32 {
        self.rect.width()
    }

    pub fn height(&self) -> f32 {
        self.rect.height()
    }
}

/// 3x3 projective matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(Mat3);

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix(Mat3::IDENTITY);

    /// Builds from row-major `[sx kx tx ky sy ty p0 p1 p2]`.
    pub fn from_row_major(m: [f32; 9]) -> Self {
        Self(Mat3::from_cols(
            Vec3::new(m[0], m[3], m[6]),
            Vec3::new(m[1], m[4], m[7]),
            Vec3::new(m[2], m[5], m[8]),
        ))
    }

    /// Builds an affine matrix from row-major `[sx kx tx ky sy ty]`.
    pub fn from_affine(m: [f32; 6]) -> Self {
        Self::from_row_major([m[0], m[1], m[2], m[3], m[4], m[5], 0.0, 0.0, 1.0])
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self(Mat3::from_translation(Vec2::new(tx, ty)))
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self(Mat3::from_scale(Vec2::new(sx, sy)))
    }

    /// Rotation about the origin; positive angles turn +x toward +y.
    pub fn rotate_deg(degrees: f32) -> Self {
        Self(Mat3::from_angle(degrees.to_radians()))
    }

    pub fn as_mat3(&self) -> &Mat3 {
        &self.0
    }

    pub fn scale_x(&self) -> f32 {
        self.0.x_axis.x
    }

    pub fn skew_y(&self) -> f32 {
        self.0.x_axis.y
    }

    pub fn persp0(&self) -> f32 {
        self.0.x_axis.z
    }

    pub fn skew_x(&self) -> f32 {
        self.0.y_axis.x
    }

    pub fn scale_y(&self) -> f32 {
        self.0.y_axis.y
    }

    pub fn persp1(&self) -> f32 {
        self.0.y_axis.z
    }

    pub fn trans_x(&self) -> f32 {
        self.0.z_axis.x
    }

    pub fn trans_y(&self) -> f32 {
        self.0.z_axis.y
    }

    pub fn persp2(&self) -> f32 {
        self.0.z_axis.z
    }

    /// Row-major `[sx kx tx ky sy ty p0 p1 p2]`.
    pub fn to_row_major(&self) -> [f32; 9] {
        [
            self.scale_x(),
            self.skew_x(),
            self.trans_x(),
            self.skew_y(),
            self.scale_y(),
            self.trans_y(),
            self.persp0(),
            self.persp1(),
            self.persp2(),
        ]
    }

    pub fn is_identity(&self) -> bool {
        self.0 == Mat3::IDENTITY
    }

    pub fn has_perspective(&self) -> bool {
        self.persp0() != 0.0 || self.persp1() != 0.0 || self.persp2() != 1.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    /// `self = self * translate(tx, ty)`: the translation is applied first.
    pub fn pre_translate(&mut self, tx: f32, ty: f32) {
        *self = *self * Matrix::translate(tx, ty);
    }

    /// `self = self * scale(sx, sy)`: the scale is applied first.
    pub fn pre_scale(&mut self, sx: f32, sy: f32) {
        *self = *self * Matrix::scale(sx, sy);
    }

    /// True if the matrix maps perpendicular vectors to perpendicular vectors.
    pub fn preserves_right_angles(&self) -> bool {
        self.preserves_right_angles_tol(1.0 / 4096.0)
    }

    pub fn preserves_right_angles_tol(&self, tol: f32) -> bool {
        if self.has_perspective() {
            return false;
        }
        let (sx, kx, ky, sy) = (self.scale_x(), self.skew_x(), self.skew_y(), self.scale_y());
        if kx == 0.0 && ky == 0.0 {
            return true;
        }
        let tol2 = tol * tol;
        if (sx * sy - kx * ky).abs() <= tol2 {
            return false;
        }
        let col0 = Vec2::new(sx, ky);
        let col1 = Vec2::new(kx, sy);
        col0.dot(col1).abs() <= tol2
    }

    /// Maps a point, dividing by w for perspective matrices.
    pub fn map_point(&self, p: Vec2) -> Vec2 {
        let v = self.0 * p.extend(1.0);
        if self.has_perspective() && v.z != 0.0 {
            Vec2::new(v.x / v.z, v.y / v.z)
        } else {
            v.truncate()
        }
    }

    /// Bounds of the four mapped corners of `rect`.
    pub fn map_rect_bounds(&self, rect: &Rect) -> Rect {
        Rect::from_points(&rect.corners().map(|c| self.map_point(c)))
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    /// `a * b` applies `b` first, then `a`.
    fn mul(self, rhs: Matrix) -> Matrix {
        Matrix(self.0 * rhs.0)
    }
}

impl From<Mat3> for Matrix {
    fn from(m: Mat3) -> Self {
        Self(m)
    }
}
