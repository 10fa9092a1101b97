use super::Rect;
use crate::{common::*, Transform};

/// Bounding box in CyCxHW format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CyCxHW<T> {
    pub(crate) cy: T,
    pub(crate) cx: T,
    pub(crate) h: T,
    pub(crate) w: T,
}

impl<T> CyCxHW<T> {
    pub fn try_cast<V>(self) -> Option<CyCxHW<V>>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        Some(CyCxHW {
            cy: V::from(self.cy)?,
            cx: V::from(self.cx)?,
            h: V::from(self.h)?,
            w: V::from(self.w)?,
        })
    }
}

impl<T> CyCxHW<T>
where
    T: Copy + Num,
{
    pub fn transform(&self, transform: &Transform<T>) -> Self {
        CyCxHW {
            cy: self.cy * transform.sy + transform.ty,
            cx: self.cx * transform.sx + transform.tx,
            h: self.h * transform.sy,
            w: self.w * transform.sx,
        }
    }
}

impl<T> CyCxHW<T>
where
    T: Copy + PartialOrd,
{
    /// Clamps each of the four components into `[min, max]` independently.
    ///
    /// The box may no longer be centered on the same point afterwards. The
    /// height and width stay non-negative as long as `min` is.
    pub fn clamp(&self, min: T, max: T) -> Self {
        let clamp = |value: T| {
            if value < min {
                min
            } else if value > max {
                max
            } else {
                value
            }
        };

        Self {
            cy: clamp(self.cy),
            cx: clamp(self.cx),
            h: clamp(self.h),
            w: clamp(self.w),
        }
    }

    /// Returns true if all four components lie in `[min, max]`.
    pub fn is_within(&self, min: T, max: T) -> bool {
        [self.cy, self.cx, self.h, self.w]
            .into_iter()
            .all(|value| value >= min && value <= max)
    }
}

impl<T> Rect for CyCxHW<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cy - self.h / two
    }

    fn l(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cx - self.w / two
    }

    fn b(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cy + self.h / two
    }

    fn r(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cx + self.w / two
    }

    fn cy(&self) -> Self::Type {
        self.cy
    }

    fn cx(&self) -> Self::Type {
        self.cx
    }

    fn h(&self) -> Self::Type {
        self.h
    }

    fn w(&self) -> Self::Type {
        self.w
    }

    fn try_from_tlbr(tlbr: [T; 4]) -> Result<Self> {
        let [t, l, b, r] = tlbr;
        Self::try_from_tlhw([t, l, b - t, r - l])
    }

    fn try_from_tlhw(tlhw: [T; 4]) -> Result<Self> {
        let [t, l, h, w] = tlhw;
        let two = T::one() + T::one();
        Self::try_from_cycxhw([t + h / two, l + w / two, h, w])
    }

    fn try_from_cycxhw(cycxhw: [T; 4]) -> Result<Self> {
        let [cy, cx, h, w] = cycxhw;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "box height and width must be non-negative"
        );

        Ok(Self { cy, cx, h, w })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cycxhw_from_tlhw() {
        let rect = CyCxHW::from_tlhw([50.0, 100.0, 30.0, 40.0]);
        assert_abs_diff_eq!(rect.cy(), 65.0);
        assert_abs_diff_eq!(rect.cx(), 120.0);
        assert_abs_diff_eq!(rect.b(), 80.0);
        assert_abs_diff_eq!(rect.r(), 140.0);
    }

    #[test]
    fn cycxhw_rejects_negative_size() {
        assert!(CyCxHW::try_from_tlhw([0.0, 0.0, -1.0, 4.0]).is_err());
        assert!(CyCxHW::try_from_cycxhw([0.5, 0.5, 0.1, -0.1]).is_err());
    }

    #[test]
    fn cycxhw_clamp() {
        let rect = CyCxHW::from_cycxhw([1.2, -0.1, 0.5, 1.5]);
        assert!(!rect.is_within(0.0, 1.0));

        let clamped = rect.clamp(0.0, 1.0);
        assert!(clamped.is_within(0.0, 1.0));
        assert_eq!(clamped.cycxhw(), [1.0, 0.0, 0.5, 1.0]);
    }
}
