//! Payloads of the calculator demo service.
//!
//! Request body: `a`, `b`, `op` as little-endian `i32`. Response body: one
//! little-endian `i32`. Notification: header `tick`, body a little-endian
//! `u64` sequence number.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const REQUEST_LEN: usize = 12;
pub const RESULT_LEN: usize = 4;
pub const TICK_HEADER: &[u8] = b"tick";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("{what} must be {expected} bytes, got {actual}")]
    Length {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("not a tick notification")]
    NotTick,
}

/// Arithmetic operation code. Unknown codes evaluate as addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcOp {
    Add,
    Sub,
    Mul,
}

impl CalcOp {
    pub fn code(self) -> i32 {
        match self {
            CalcOp::Add => 0,
            CalcOp::Sub => 1,
            CalcOp::Mul => 2,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => CalcOp::Sub,
            2 => CalcOp::Mul,
            _ => CalcOp::Add,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CalcOp::Add => "+",
            CalcOp::Sub => "-",
            CalcOp::Mul => "*",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalcRequest {
    pub a: i32,
    pub b: i32,
    pub op: CalcOp,
}

impl CalcRequest {
    pub fn new(a: i32, b: i32, op: CalcOp) -> Self {
        Self { a, b, op }
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::with_capacity(REQUEST_LEN);
        body.put_i32_le(self.a);
        body.put_i32_le(self.b);
        body.put_i32_le(self.op.code());
        body.freeze()
    }

    pub fn decode(mut body: &[u8]) -> Result<Self, CalcError> {
        expect_len("request body", REQUEST_LEN, body.len())?;
        Ok(Self {
            a: body.get_i32_le(),
            b: body.get_i32_le(),
            op: CalcOp::from_code(body.get_i32_le()),
        })
    }

    /// Wrapping arithmetic, so every request has an answer.
    pub fn evaluate(&self) -> i32 {
        match self.op {
            CalcOp::Add => self.a.wrapping_add(self.b),
            CalcOp::Sub => self.a.wrapping_sub(self.b),
            CalcOp::Mul => self.a.wrapping_mul(self.b),
        }
    }
}

pub fn encode_result(value: i32, dst: &mut impl BufMut) {
    dst.put_i32_le(value);
}

pub fn decode_result(mut body: &[u8]) -> Result<i32, CalcError> {
    expect_len("response body", RESULT_LEN, body.len())?;
    Ok(body.get_i32_le())
}

pub fn encode_tick(seq: u64) -> Bytes {
    let mut body = BytesMut::with_capacity(8);
    body.put_u64_le(seq);
    body.freeze()
}

pub fn decode_tick(header: &[u8], mut body: &[u8]) -> Result<u64, CalcError> {
    if header != TICK_HEADER {
        return Err(CalcError::NotTick);
    }
    expect_len("tick body", 8, body.len())?;
    Ok(body.get_u64_le())
}

fn expect_len(what: &'static str, expected: usize, actual: usize) -> Result<(), CalcError> {
    if actual == expected {
        Ok(())
    } else {
        Err(CalcError::Length {
            what,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_request_layout() {
        let body = CalcRequest::new(5, 7, CalcOp::Add).encode();
        assert_eq!(body.as_ref(), &[5, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(CalcRequest::decode(&body).unwrap().evaluate(), 12);
    }

    #[test]
    fn unknown_op_adds() {
        let mut body = BytesMut::new();
        body.put_i32_le(3);
        body.put_i32_le(4);
        body.put_i32_le(99);
        let request = CalcRequest::decode(&body).unwrap();
        assert_eq!(request.op, CalcOp::Add);
        assert_eq!(request.evaluate(), 7);
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(CalcRequest::new(i32::MAX, 1, CalcOp::Add).evaluate(), i32::MIN);
        assert_eq!(CalcRequest::new(3, 10, CalcOp::Sub).evaluate(), -7);
        assert_eq!(CalcRequest::new(-6, 7, CalcOp::Mul).evaluate(), -42);
    }

    #[test]
    fn short_bodies_are_rejected() {
        assert_eq!(
            CalcRequest::decode(&[0u8; 8]),
            Err(CalcError::Length {
                what: "request body",
                expected: 12,
                actual: 8
            })
        );
        assert!(decode_result(&[1, 2]).is_err());
    }

    #[test]
    fn tick_requires_header() {
        let body = encode_tick(9);
        assert_eq!(decode_tick(TICK_HEADER, &body), Ok(9));
        assert_eq!(decode_tick(b"other", &body), Err(CalcError::NotTick));
    }
}
