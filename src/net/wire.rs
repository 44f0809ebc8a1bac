//! 线路格式
//!
//! ```text
//! 数据单元:  [8 字节 ASCII 十进制 id，左补 0][payload]
//! ACK 单元:  [8 字节 ASCII 十进制 id]
//! 轮次开始:  "00000000" + "S"
//! 流结束:    "-0000001" + "EOF"
//! 会话终止:  "-0000002" + "END"   （接收端以 "-0000002" 确认）
//! ```
//!
//! 负数 id 的补 0 发生在符号之后（与 `format!("{:08}", -1)` 一致）。

use crate::error::WireError;

/// id 前缀宽度（字节）
pub const ID_WIDTH: usize = 8;
/// 8 位十进制能表示的最大数据 id
pub const MAX_PACKET_ID: u64 = 99_999_999;

pub const START_ID: i64 = 0;
pub const EOF_ID: i64 = -1;
pub const END_ID: i64 = -2;

pub const START_PAYLOAD: &[u8] = b"S";
pub const EOF_PAYLOAD: &[u8] = b"EOF";
pub const END_PAYLOAD: &[u8] = b"END";

/// 接收端向发送端宣告自身地址的握手报文
pub const CONNECT: &[u8] = b"CONNECT";

/// 解码后的发送端单元（接收端视角）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit<'a> {
    Start,
    Data { id: u64, payload: &'a [u8] },
    Eof,
    End,
}

pub fn encode_id(id: i64) -> String {
    format!("{id:0width$}", width = ID_WIDTH)
}

fn encode_unit(id: i64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ID_WIDTH + payload.len());
    out.extend_from_slice(encode_id(id).as_bytes());
    out.extend_from_slice(payload);
    out
}

/// 调用方保证 `id <= MAX_PACKET_ID`
pub fn encode_data(id: u64, payload: &[u8]) -> Vec<u8> {
    debug_assert!(id <= MAX_PACKET_ID);
    encode_unit(id as i64, payload)
}

pub fn encode_start() -> Vec<u8> {
    encode_unit(START_ID, START_PAYLOAD)
}

pub fn encode_eof() -> Vec<u8> {
    encode_unit(EOF_ID, EOF_PAYLOAD)
}

pub fn encode_end() -> Vec<u8> {
    encode_unit(END_ID, END_PAYLOAD)
}

pub fn encode_ack(id: i64) -> Vec<u8> {
    encode_id(id).into_bytes()
}

fn parse_id(buf: &[u8]) -> Result<i64, WireError> {
    let Some(prefix) = buf.get(..ID_WIDTH) else {
        return Err(WireError::TooShort {
            len: buf.len(),
            need: ID_WIDTH,
        });
    };
    let invalid = || WireError::InvalidId(String::from_utf8_lossy(prefix).into_owned());
    // 只接受可选的前导 '-' 加数字，不允许 '+' 或空白
    let digits = prefix.strip_prefix(b"-").unwrap_or(prefix);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    std::str::from_utf8(prefix)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(invalid)
}

/// 解析 ACK 单元，返回被确认的 id（可能为负数的哨兵 id）
pub fn decode_ack(buf: &[u8]) -> Result<i64, WireError> {
    parse_id(buf)
}

pub fn decode_unit(buf: &[u8]) -> Result<Unit<'_>, WireError> {
    let id = parse_id(buf)?;
    let payload = &buf[ID_WIDTH..];
    match id {
        START_ID => Ok(Unit::Start),
        EOF_ID => Ok(Unit::Eof),
        END_ID => Ok(Unit::End),
        id if id > 0 => Ok(Unit::Data {
            id: id as u64,
            payload,
        }),
        other => Err(WireError::InvalidId(other.to_string())),
    }
}
