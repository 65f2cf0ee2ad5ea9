// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use std::{fmt, str::FromStr};

/// Four-character code identifying a V4L2 pixel or compressed format
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FromStr for FourCC {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(format!("FOURCC must be exactly 4 ASCII characters: {}", s));
        }
        Ok(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                for b in self.0 {
                    write!(f, "{}", std::ascii::escape_default(b))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FourCC")
            .field(&format_args!("{}", self))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("RGB3".parse::<FourCC>(), Ok(FourCC(*b"RGB3")));
        assert!("RGB".parse::<FourCC>().is_err());
        assert!("RGB32".parse::<FourCC>().is_err());
        assert!("AB\n4".parse::<FourCC>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", FourCC(*b"GREY")), "GREY");
        assert_eq!(format!("{:?}", FourCC(*b"GREY")), "FourCC(GREY)");
        assert_eq!(format!("{}", FourCC([0xff, b'A', b'B', b'C'])), "\\xffABC");
    }
}
