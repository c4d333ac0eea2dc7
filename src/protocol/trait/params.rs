use crate::error::Result;
use crate::protocol::r#trait::param::Param;

/// Trait for a positional list of statement parameters
///
/// Implementations only enumerate their parameters through [`Params::visit`]; the
/// binary encoding of the whole list is derived from that.
pub trait Params {
    /// Number of parameters
    fn len(&self) -> usize;

    /// Check if there are no parameters
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `f` for each parameter in order, stopping at the first error
    fn visit(&self, f: &mut dyn FnMut(&dyn Param) -> Result<()>) -> Result<()>;

    /// Write NULL bitmap
    ///
    /// The NULL bitmap is (num_params + 7) / 8 bytes long.
    /// Bit is set to 1 if the parameter is NULL.
    fn write_null_bitmap(&self, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        out.resize(start + self.len().div_ceil(8), 0);
        let mut idx = 0;
        self.visit(&mut |param| {
            if param.is_null()
                && let Some(byte) = out.get_mut(start + (idx >> 3))
            {
                *byte |= 1 << (idx & 7);
            }
            idx += 1;
            Ok(())
        })
    }

    /// Write parameter types
    ///
    /// Each parameter type is 2 bytes:
    /// - 1 byte: MySQL type (MYSQL_TYPE_*)
    /// - 1 byte: unsigned flag (0x80 if unsigned, 0x00 otherwise)
    fn write_types(&self, out: &mut Vec<u8>) -> Result<()> {
        self.visit(&mut |param| {
            param.encode_type(out);
            Ok(())
        })
    }

    /// Write parameter values (binary encoded)
    ///
    /// NULL parameters are skipped; they're already in the NULL bitmap.
    fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
        self.visit(&mut |param| {
            if param.is_null() {
                Ok(())
            } else {
                param.encode_value(out)
            }
        })
    }
}

/// Empty parameters (no parameters)
impl Params for () {
    fn len(&self) -> usize {
        0
    }

    fn visit(&self, _f: &mut dyn FnMut(&dyn Param) -> Result<()>) -> Result<()> {
        Ok(())
    }
}

impl<P: Params + ?Sized> Params for &P {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn visit(&self, f: &mut dyn FnMut(&dyn Param) -> Result<()>) -> Result<()> {
        (**self).visit(f)
    }
}

impl<T: Param> Params for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn visit(&self, f: &mut dyn FnMut(&dyn Param) -> Result<()>) -> Result<()> {
        for param in self {
            f(param)?;
        }
        Ok(())
    }
}

impl<T: Param, const N: usize> Params for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn visit(&self, f: &mut dyn FnMut(&dyn Param) -> Result<()>) -> Result<()> {
        self.as_slice().visit(f)
    }
}

impl<T: Param> Params for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn visit(&self, f: &mut dyn FnMut(&dyn Param) -> Result<()>) -> Result<()> {
        self.as_slice().visit(f)
    }
}

macro_rules! impl_params_for_tuple {
    ($len:expr; $($idx:tt $ty:ident),+) => {
        impl<$($ty: Param),+> Params for ($($ty,)+) {
            fn len(&self) -> usize {
                $len
            }

            fn visit(&self, f: &mut dyn FnMut(&dyn Param) -> Result<()>) -> Result<()> {
                $( f(&self.$idx)?; )+
                Ok(())
            }
        }
    };
}

impl_params_for_tuple!(1; 0 A);
impl_params_for_tuple!(2; 0 A, 1 B);
impl_params_for_tuple!(3; 0 A, 1 B, 2 C);
impl_params_for_tuple!(4; 0 A, 1 B, 2 C, 3 D);
impl_params_for_tuple!(5; 0 A, 1 B, 2 C, 3 D, 4 E);
impl_params_for_tuple!(6; 0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_params_for_tuple!(7; 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
impl_params_for_tuple!(8; 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);
impl_params_for_tuple!(9; 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I);
impl_params_for_tuple!(10; 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J);
impl_params_for_tuple!(11; 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K);
impl_params_for_tuple!(12; 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K, 11 L);
