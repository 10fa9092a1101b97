use crate::common::*;

/// The height and width of an image or a box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HW<T> {
    w: T,
    h: T,
}

impl<T> HW<T> {
    pub fn try_cast<U>(self) -> Option<HW<U>>
    where
        T: ToPrimitive,
        U: NumCast,
    {
        Some(HW {
            h: U::from(self.h)?,
            w: U::from(self.w)?,
        })
    }
}

impl<T> HW<T>
where
    T: Num + PartialOrd + Copy,
{
    pub fn try_from_hw(hw: [T; 2]) -> Result<Self> {
        let [h, w] = hw;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "height and width parameters must be non-negative"
        );
        Ok(Self { w, h })
    }

    pub fn from_hw(hw: [T; 2]) -> Self {
        Self::try_from_hw(hw).unwrap()
    }

    /// Builds a size from the `(width, height)` order used by image headers.
    pub fn try_from_wh(w: T, h: T) -> Result<Self> {
        Self::try_from_hw([h, w])
    }

    pub fn area(&self) -> T {
        self.w * self.h
    }

    /// Returns true if both sides are strictly positive.
    pub fn is_positive(&self) -> bool {
        let zero = T::zero();
        self.h > zero && self.w > zero
    }

    pub fn w(&self) -> T {
        self.w
    }

    pub fn h(&self) -> T {
        self.h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn size_area() {
        let s1 = HW::from_hw([3.0, 2.0]);
        let area: f64 = s1.area();
        assert_abs_diff_eq!(area, 6.0);
    }

    #[test]
    fn size_from_wh() {
        let size = HW::try_from_wh(640usize, 480).unwrap();
        assert_eq!(size.w(), 640);
        assert_eq!(size.h(), 480);
        assert!(size.is_positive());
        assert!(!HW::try_from_wh(0usize, 480).unwrap().is_positive());

        let size: HW<f64> = size.try_cast().unwrap();
        assert_abs_diff_eq!(size.area(), 307200.0);
    }
}
