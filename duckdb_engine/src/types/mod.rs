//! Host-side value model and the DuckDB physical type enumeration.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;

/// Physical column/parameter type tag (`duckdb_type`).
///
/// Discriminants match the C enum exactly, including the out-of-order
/// UHUGEINT (32) and ARRAY (33) entries added after the original range was
/// assigned. Width/scale for DECIMAL live in the logical type, not here.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    Invalid = 0,
    Boolean = 1,
    TinyInt = 2,
    SmallInt = 3,
    Integer = 4,
    BigInt = 5,
    UTinyInt = 6,
    USmallInt = 7,
    UInteger = 8,
    UBigInt = 9,
    Float = 10,
    Double = 11,
    Timestamp = 12,
    Date = 13,
    Time = 14,
    Interval = 15,
    HugeInt = 16,
    Varchar = 17,
    Blob = 18,
    Decimal = 19,
    TimestampS = 20,
    TimestampMs = 21,
    TimestampNs = 22,
    Enum = 23,
    List = 24,
    Struct = 25,
    Map = 26,
    Uuid = 27,
    Union = 28,
    Bit = 29,
    TimeTz = 30,
    TimestampTz = 31,
    UHugeInt = 32,
    Array = 33,
    Any = 34,
    VarInt = 35,
    SqlNull = 36,
    StringLiteral = 37,
    IntegerLiteral = 38,
}

impl PhysicalType {
    /// Maps a raw `duckdb_type` value; unknown codes (from a newer library
    /// build) collapse to `Invalid` rather than failing.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Boolean,
            2 => Self::TinyInt,
            3 => Self::SmallInt,
            4 => Self::Integer,
            5 => Self::BigInt,
            6 => Self::UTinyInt,
            7 => Self::USmallInt,
            8 => Self::UInteger,
            9 => Self::UBigInt,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::Timestamp,
            13 => Self::Date,
            14 => Self::Time,
            15 => Self::Interval,
            16 => Self::HugeInt,
            17 => Self::Varchar,
            18 => Self::Blob,
            19 => Self::Decimal,
            20 => Self::TimestampS,
            21 => Self::TimestampMs,
            22 => Self::TimestampNs,
            23 => Self::Enum,
            24 => Self::List,
            25 => Self::Struct,
            26 => Self::Map,
            27 => Self::Uuid,
            28 => Self::Union,
            29 => Self::Bit,
            30 => Self::TimeTz,
            31 => Self::TimestampTz,
            32 => Self::UHugeInt,
            33 => Self::Array,
            34 => Self::Any,
            35 => Self::VarInt,
            36 => Self::SqlNull,
            37 => Self::StringLiteral,
            38 => Self::IntegerLiteral,
            _ => Self::Invalid,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Nested container types the calling convention cannot carry.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            Self::List | Self::Struct | Self::Map | Self::Array | Self::Union
        )
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "INVALID",
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::UTinyInt => "UTINYINT",
            Self::USmallInt => "USMALLINT",
            Self::UInteger => "UINTEGER",
            Self::UBigInt => "UBIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Timestamp => "TIMESTAMP",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Interval => "INTERVAL",
            Self::HugeInt => "HUGEINT",
            Self::UHugeInt => "UHUGEINT",
            Self::Varchar => "VARCHAR",
            Self::Blob => "BLOB",
            Self::Decimal => "DECIMAL",
            Self::TimestampS => "TIMESTAMP_S",
            Self::TimestampMs => "TIMESTAMP_MS",
            Self::TimestampNs => "TIMESTAMP_NS",
            Self::Enum => "ENUM",
            Self::List => "LIST",
            Self::Struct => "STRUCT",
            Self::Map => "MAP",
            Self::Uuid => "UUID",
            Self::Union => "UNION",
            Self::Bit => "BIT",
            Self::TimeTz => "TIME WITH TIME ZONE",
            Self::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            Self::Array => "ARRAY",
            Self::Any => "ANY",
            Self::VarInt => "VARINT",
            Self::SqlNull => "SQLNULL",
            Self::StringLiteral => "STRING_LITERAL",
            Self::IntegerLiteral => "INTEGER_LITERAL",
        };
        f.write_str(name)
    }
}

/// Calendar date as DuckDB stores it: days since 1970-01-01.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Date {
    pub days: i32,
}

impl Date {
    pub fn from_naive(date: NaiveDate) -> Self {
        let days = (date - epoch_date()).num_days() as i32;
        Self { days }
    }

    pub fn to_naive(self) -> Option<NaiveDate> {
        epoch_date().checked_add_signed(chrono::Duration::days(i64::from(self.days)))
    }
}

/// Time of day as DuckDB stores it: microseconds since midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time {
    pub micros: i64,
}

impl Time {
    pub fn from_naive(time: NaiveTime) -> Self {
        let micros = i64::from(time.num_seconds_from_midnight()) * 1_000_000
            + i64::from(time.nanosecond()) / 1_000;
        Self { micros }
    }

    pub fn to_naive(self) -> Option<NaiveTime> {
        if self.micros < 0 {
            return None;
        }
        let secs = (self.micros / 1_000_000) as u32;
        let nanos = ((self.micros % 1_000_000) * 1_000) as u32;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
    }
}

/// Point in time as DuckDB stores it: microseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub micros: i64,
}

impl Timestamp {
    pub fn from_naive(datetime: NaiveDateTime) -> Self {
        Self {
            micros: datetime.and_utc().timestamp_micros(),
        }
    }

    pub fn to_naive(self) -> Option<NaiveDateTime> {
        let secs = self.micros.div_euclid(1_000_000);
        let nanos = (self.micros.rem_euclid(1_000_000) * 1_000) as u32;
        chrono::DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
    }
}

/// DuckDB interval. Part of the value model for completeness; the binding
/// boundary rejects it (three-field by-value struct, see the binder docs).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

/// Exact decimal: `value` is the unscaled 128-bit magnitude, so the
/// numeric value is `value * 10^(-scale)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decimal {
    pub width: u8,
    pub scale: u8,
    pub value: i128,
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.value);
        }
        let sign = if self.value < 0 { "-" } else { "" };
        let magnitude = self.value.unsigned_abs();
        let divisor = 10u128.pow(u32::from(self.scale));
        let integral = magnitude / divisor;
        let fractional = magnitude % divisor;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            integral,
            fractional,
            width = usize::from(self.scale)
        )
    }
}

/// A dynamically-typed host value crossing the native boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(Date),
    Time(Time),
    Timestamp(Timestamp),
    Interval(Interval),
    HugeInt(i128),
    UHugeInt(u128),
    Decimal(Decimal),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The physical type this value naturally maps to, used to pick a bind
    /// target when the statement exposes no parameter type metadata.
    pub fn natural_type(&self) -> PhysicalType {
        match self {
            Value::Null => PhysicalType::SqlNull,
            Value::Boolean(_) => PhysicalType::Boolean,
            Value::Int8(_) => PhysicalType::TinyInt,
            Value::Int16(_) => PhysicalType::SmallInt,
            Value::Int32(_) => PhysicalType::Integer,
            Value::Int64(_) => PhysicalType::BigInt,
            Value::UInt8(_) => PhysicalType::UTinyInt,
            Value::UInt16(_) => PhysicalType::USmallInt,
            Value::UInt32(_) => PhysicalType::UInteger,
            Value::UInt64(_) => PhysicalType::UBigInt,
            Value::Float(_) => PhysicalType::Float,
            Value::Double(_) => PhysicalType::Double,
            Value::Text(_) => PhysicalType::Varchar,
            Value::Blob(_) => PhysicalType::Blob,
            Value::Date(_) => PhysicalType::Date,
            Value::Time(_) => PhysicalType::Time,
            Value::Timestamp(_) => PhysicalType::Timestamp,
            Value::Interval(_) => PhysicalType::Interval,
            Value::HugeInt(_) => PhysicalType::HugeInt,
            Value::UHugeInt(_) => PhysicalType::UHugeInt,
            Value::Decimal(_) => PhysicalType::Decimal,
        }
    }
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date is valid")
}
