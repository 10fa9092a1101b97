use super::CyCxHW;
use crate::common::*;

/// The generic rectangle.
///
/// Coordinates follow the image convention: `t`/`b` grow downwards along
/// the y axis and `l`/`r` grow rightwards along the x axis.
pub trait Rect {
    type Type;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn b(&self) -> Self::Type;
    fn r(&self) -> Self::Type;
    fn cy(&self) -> Self::Type;
    fn cx(&self) -> Self::Type;
    fn h(&self) -> Self::Type;
    fn w(&self) -> Self::Type;

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_cycxhw(cycxhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd,
{
    /// Panicking variant of [Rect::try_from_tlbr].
    fn from_tlbr(tlbr: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlbr(tlbr).unwrap()
    }

    fn from_tlhw(tlhw: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlhw(tlhw).unwrap()
    }

    fn from_cycxhw(cycxhw: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_cycxhw(cycxhw).unwrap()
    }

    fn cycxhw(&self) -> [Self::Type; 4] {
        [self.cy(), self.cx(), self.h(), self.w()]
    }

    fn tlbr(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.b(), self.r()]
    }

    fn tlhw(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.h(), self.w()]
    }

    fn hw(&self) -> [Self::Type; 2] {
        [self.h(), self.w()]
    }

    fn to_cycxhw(&self) -> CyCxHW<Self::Type> {
        CyCxHW {
            cy: self.cy(),
            cx: self.cx(),
            h: self.h(),
            w: self.w(),
        }
    }

    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.h() * self.w()
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd,
{
}
