use super::{CyCxHW, Rect};
use crate::{common::*, HW};

/// An axis-aligned affine transform, `y' = y * sy + ty` and `x' = x * sx + tx`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transform<T> {
    pub sy: T,
    pub sx: T,
    pub ty: T,
    pub tx: T,
}

impl<T> Transform<T>
where
    T: Copy + Num + PartialOrd,
{
    /// The transform that maps `src` onto `tgt`.
    pub fn from_rects<R>(src: &R, tgt: &R) -> Self
    where
        R: Rect<Type = T>,
    {
        let sy = tgt.h() / src.h();
        let sx = tgt.w() / src.w();
        let ty = tgt.t() - src.t() * sy;
        let tx = tgt.l() - src.l() * sx;

        Self { sy, sx, ty, tx }
    }

    /// Stretches the `src` frame onto the `tgt` frame, both anchored at the origin.
    pub fn try_from_sizes_exact(src: &HW<T>, tgt: &HW<T>) -> Result<Self> {
        ensure!(
            src.is_positive(),
            "the source size must have positive height and width"
        );

        Ok(Self {
            sy: tgt.h() / src.h(),
            sx: tgt.w() / src.w(),
            ty: T::zero(),
            tx: T::zero(),
        })
    }

    /// Maps pixel coordinates of an image of `size` into the unit square.
    pub fn try_normalize(size: &HW<T>) -> Result<Self> {
        let one = T::one();
        Self::try_from_sizes_exact(size, &HW::try_from_hw([one, one])?)
    }
}

impl<T> Transform<T>
where
    T: Copy + Num + Neg<Output = T>,
{
    pub fn inverse(&self) -> Self {
        let sy = T::one() / self.sy;
        let sx = T::one() / self.sx;
        let ty = -self.ty / self.sy;
        let tx = -self.tx / self.sx;

        Self { sy, sx, ty, tx }
    }
}

impl<T> Mul<&CyCxHW<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = CyCxHW<T>;

    fn mul(self, rhs: &CyCxHW<T>) -> Self::Output {
        rhs.transform(self)
    }
}

impl<T> Mul<&Transform<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = Transform<T>;

    fn mul(self, rhs: &Transform<T>) -> Self::Output {
        Transform {
            sx: self.sx * rhs.sx,
            sy: self.sy * rhs.sy,
            tx: rhs.tx * self.sx + self.tx,
            ty: rhs.ty * self.sy + self.ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;
    use approx::assert_abs_diff_eq;

    #[test]
    fn transform_inverse() {
        let orig = Transform {
            sx: 2.0,
            sy: 2.0,
            tx: 1.0,
            ty: 1.0,
        };
        assert_eq!(orig.inverse().inverse(), orig);
        assert_eq!(&orig * &orig.inverse(), Transform {
            sx: 1.0,
            sy: 1.0,
            tx: 0.0,
            ty: 0.0,
        });
    }

    #[test]
    fn transform_between_rects() {
        let src = CyCxHW::from_tlhw([10.0, 10.0, 20.0, 40.0]);
        let tgt = CyCxHW::from_tlhw([0.0, 0.0, 10.0, 10.0]);
        let transform = Transform::from_rects(&src, &tgt);
        let mapped = &transform * &src;

        mapped
            .tlhw()
            .iter()
            .zip(tgt.tlhw())
            .for_each(|(&lhs, rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12));
    }

    #[test]
    fn resize_exact() {
        let transform =
            Transform::try_from_sizes_exact(&HW::from_hw([80.0, 80.0]), &HW::from_hw([20.0, 40.0]))
                .unwrap();
        let expect = Transform {
            sx: 0.5,
            sy: 0.25,
            tx: 0.0,
            ty: 0.0,
        };
        assert_eq!(transform, expect);
    }

    #[test]
    fn resize_rejects_empty_source() {
        let result =
            Transform::try_from_sizes_exact(&HW::from_hw([0.0, 80.0]), &HW::from_hw([1.0, 1.0]));
        assert!(result.is_err());
    }

    #[test]
    fn normalize_pixel_box() {
        let size = HW::try_from_wh(640.0, 480.0).unwrap();
        let transform = Transform::try_normalize(&size).unwrap();
        let pixel = CyCxHW::from_tlhw([50.0, 100.0, 30.0, 40.0]);
        let ratio = &transform * &pixel;

        assert_abs_diff_eq!(ratio.cx(), 0.1875, epsilon = 1e-12);
        assert_abs_diff_eq!(ratio.cy(), 65.0 / 480.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ratio.w(), 0.0625, epsilon = 1e-12);
        assert_abs_diff_eq!(ratio.h(), 0.0625, epsilon = 1e-12);

        let restored = &transform.inverse() * &ratio;
        restored
            .tlhw()
            .iter()
            .zip([50.0, 100.0, 30.0, 40.0])
            .for_each(|(&lhs, rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9));
    }
}
