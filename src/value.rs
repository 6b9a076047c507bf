use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use crate::error::SimError;

/// Single four-state bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Logic {
    Zero,
    One,
    X,
    Z,
}

impl Logic {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            '0' => Some(Logic::Zero),
            '1' => Some(Logic::One),
            'x' => Some(Logic::X),
            'z' => Some(Logic::Z),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Logic::Zero => '0',
            Logic::One => '1',
            Logic::X => 'x',
            Logic::Z => 'z',
        }
    }

    pub fn is_resolvable(self) -> bool {
        matches!(self, Logic::Zero | Logic::One)
    }
}

impl From<bool> for Logic {
    fn from(b: bool) -> Self {
        if b {
            Logic::One
        } else {
            Logic::Zero
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Bit vector value of a signal. Bit 0 is the least significant bit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogicVec {
    bits: Vec<Logic>,
}

impl LogicVec {
    /// All bits set to `fill`.
    pub fn filled(width: u32, fill: Logic) -> Self {
        Self {
            bits: vec![fill; width as usize],
        }
    }

    pub fn zeros(width: u32) -> Self {
        Self::filled(width, Logic::Zero)
    }

    /// Truncates `value` to `width` bits.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let bits = (0..width)
            .map(|i| Logic::from(i < 64 && (value >> i) & 1 == 1))
            .collect();
        Self { bits }
    }

    /// Parses `0b1010`, `10_1x` etc. Width is the number of digits.
    pub fn from_bin(s: &str) -> Result<Self, SimError> {
        let stripped = s.trim().trim_start_matches("0b").replace('_', "");
        if stripped.is_empty() {
            return Err(SimError::InvalidBinary(s.to_string()));
        }
        let mut bits = Vec::with_capacity(stripped.len());
        for c in stripped.chars().rev() {
            bits.push(Logic::from_char(c).ok_or_else(|| SimError::InvalidBinary(s.to_string()))?);
        }
        Ok(Self { bits })
    }

    pub fn width(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn bit(&self, index: u32) -> Option<Logic> {
        self.bits.get(index as usize).copied()
    }

    pub fn set_bit(&mut self, index: u32, value: Logic) {
        if let Some(b) = self.bits.get_mut(index as usize) {
            *b = value;
        }
    }

    pub fn is_resolvable(&self) -> bool {
        self.bits.iter().all(|b| b.is_resolvable())
    }

    /// Integer value, `None` if any bit is x or z or the vector is wider than 64 bits
    /// with ones above bit 63.
    pub fn to_u64(&self) -> Option<u64> {
        let mut acc = 0u64;
        for (i, b) in self.bits.iter().enumerate() {
            match b {
                Logic::Zero => {}
                Logic::One if i < 64 => acc |= 1 << i,
                _ => return None,
            }
        }
        Some(acc)
    }
}

impl Index<usize> for LogicVec {
    type Output = Logic;

    fn index(&self, index: usize) -> &Logic {
        &self.bits[index]
    }
}

impl FromStr for LogicVec {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicVec::from_bin(s)
    }
}

impl fmt::Display for LogicVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bits.iter().rev() {
            write!(f, "{}", b.as_char())?;
        }
        Ok(())
    }
}

/// Payload of a finished task or test.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    None,
    Int(i64),
    String(String),
    Value(LogicVec),
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::None => Ok(()),
            Val::Int(i) => write!(f, "{}", i),
            Val::String(s) => write!(f, "{}", s),
            Val::Value(v) => write!(f, "{}", v),
        }
    }
}
