//! PostgreSQL backend
//!
//! Used in production. Values are bound through a [`ToSql`] implementation
//! that adapts the tagged [`Value`] to the column type the server expects,
//! so an integer can be written to an `INT4` column and a numeric literal
//! typed as text can be written to a `FLOAT8` column.
//!
//! `NUMERIC` columns are read as floats and written from the decimal form
//! of the bound number.

use std::error::Error as StdError;

use ::postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use ::postgres::{Client, NoTls, Row, Transaction};
use bytes::BytesMut;
use tracing::{debug, warn};

use super::{Backend, Dialect, Executor};
use crate::error::BackendError;
use crate::value::{Record, RowId, Value};

type BoxError = Box<dyn StdError + Sync + Send>;

/// PostgreSQL connection
pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    /// Connect using a connection string such as `postgresql://user@host/db`
    pub fn connect(url: &str) -> Result<Self, BackendError> {
        let client = Client::connect(url, NoTls)?;
        debug!("connected to PostgreSQL");
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Backend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, BackendError> {
        let rows = self.client.query(sql, &param_refs(params))?;
        rows.iter().map(row_to_record).collect()
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Executor) -> Result<T, E>,
        E: From<BackendError>,
    {
        let mut tx = self.client.transaction().map_err(BackendError::from)?;

        match f(&mut tx) {
            Ok(value) => {
                tx.commit().map_err(BackendError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}

impl Executor for Transaction<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, BackendError> {
        Ok(Transaction::execute(self, sql, &param_refs(params))?)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, BackendError> {
        let rows = Transaction::query(self, sql, &param_refs(params))?;
        rows.iter().map(row_to_record).collect()
    }

    fn last_insert_id(&mut self) -> Result<RowId, BackendError> {
        let row = self.query_one("SELECT lastval()", &[])?;
        Ok(row.try_get::<_, i64>(0)?)
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn row_to_record(row: &Row) -> Result<Record, BackendError> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(v.into()))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Int(v.into()))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)?.map(Value::Int)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Float(v.into()))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(idx)?.map(Value::Float)
        } else if *ty == Type::NUMERIC {
            row.try_get::<_, Option<Numeric>>(idx)?
                .map(|n| if n.0.is_nan() { Value::Null } else { Value::Float(n.0) })
        } else if is_text(ty) {
            row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
        } else {
            return Err(BackendError::new(format!(
                "unsupported type {} for column {}",
                ty,
                column.name()
            )));
        };
        record.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }
    Ok(record)
}

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT
        || *ty == Type::VARCHAR
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
        || *ty == Type::UNKNOWN
}

/// A `NUMERIC` value read as a float
///
/// The binary form is a header (digit count, weight, sign, display scale)
/// followed by base-10000 digits, most significant first.
struct Numeric(f64);

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

impl<'a> FromSql<'a> for Numeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let word = |i: usize| -> Result<[u8; 2], BoxError> {
            raw.get(i..i + 2)
                .map(|b| [b[0], b[1]])
                .ok_or_else(|| "truncated numeric value".into())
        };

        let ndigits = i16::from_be_bytes(word(0)?);
        let weight = i16::from_be_bytes(word(2)?);
        let sign = u16::from_be_bytes(word(4)?);

        if sign == NUMERIC_NAN {
            return Ok(Numeric(f64::NAN));
        }

        let mut value = 0.0;
        for i in 0..ndigits.max(0) as usize {
            let digit = i16::from_be_bytes(word(8 + 2 * i)?);
            value += f64::from(digit) * 10_000f64.powi(i32::from(weight) - i as i32);
        }

        Ok(Numeric(if sign == NUMERIC_NEG { -value } else { value }))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Encode a plain decimal literal (`-12.345`) in the `NUMERIC` binary form
fn numeric_to_sql(decimal: &str, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let (negative, unsigned) = match decimal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, decimal),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let all_digits = int_part
        .bytes()
        .chain(frac_part.bytes())
        .all(|b| b.is_ascii_digit());
    if !all_digits || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(format!("invalid numeric literal {}", decimal).into());
    }

    // Align both parts on base-10000 digit boundaries
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let aligned = format!(
        "{}{}{}{}",
        "0".repeat(int_pad),
        int_part,
        frac_part,
        "0".repeat(frac_pad)
    );

    let mut digits: Vec<i16> = aligned
        .as_bytes()
        .chunks(4)
        .map(|c| c.iter().fold(0i16, |acc, b| acc * 10 + i16::from(b - b'0')))
        .collect();
    let mut weight = i16::try_from((int_pad + int_part.len()) / 4)? - 1;

    while digits.first() == Some(&0) {
        digits.remove(0);
        weight -= 1;
    }
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        weight = 0;
    }

    let sign = if negative && !digits.is_empty() {
        NUMERIC_NEG
    } else {
        0
    };
    let dscale = u16::try_from(frac_part.len())?;

    out.extend_from_slice(&i16::try_from(digits.len())?.to_be_bytes());
    out.extend_from_slice(&weight.to_be_bytes());
    out.extend_from_slice(&sign.to_be_bytes());
    out.extend_from_slice(&dscale.to_be_bytes());
    for digit in digits {
        out.extend_from_slice(&digit.to_be_bytes());
    }
    Ok(IsNull::No)
}

fn mismatch(kind: &str, ty: &Type) -> BoxError {
    format!("cannot bind {} to a column of type {}", kind, ty).into()
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => bool_to_sql(*b, ty, out),
            Value::Int(i) => int_to_sql(*i, ty, out),
            Value::Float(f) => float_to_sql(*f, ty, out),
            Value::Text(s) => text_to_sql(s, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Conversion is decided per value in to_sql
        true
    }

    to_sql_checked!();
}

fn bool_to_sql(v: bool, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::BOOL {
        v.to_sql(ty, out)
    } else if is_text(ty) {
        v.to_string().to_sql(ty, out)
    } else {
        Err(mismatch("boolean", ty))
    }
}

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT2 {
        i16::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::INT8 {
        v.to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (v as f64).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        numeric_to_sql(&v.to_string(), out)
    } else if *ty == Type::BOOL {
        (v != 0).to_sql(ty, out)
    } else if is_text(ty) {
        v.to_string().to_sql(ty, out)
    } else {
        Err(mismatch("integer", ty))
    }
}

fn float_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        v.to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        if !v.is_finite() {
            return Err(mismatch("non-finite float", ty));
        }
        // Display for f64 never uses exponent notation
        numeric_to_sql(&v.to_string(), out)
    } else if is_text(ty) {
        Value::Float(v).to_string().to_sql(ty, out)
    } else {
        Err(mismatch("float", ty))
    }
}

fn text_to_sql(v: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if is_text(ty) {
        v.to_sql(ty, out)
    } else if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 {
        int_to_sql(v.trim().parse::<i64>()?, ty, out)
    } else if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 || *ty == Type::NUMERIC {
        float_to_sql(v.trim().parse::<f64>()?, ty, out)
    } else if *ty == Type::BOOL {
        bool_to_sql(v.trim().parse::<bool>()?, ty, out)
    } else {
        Err(mismatch("text", ty))
    }
}
