use chrono::DateTime;
use chrono::Utc;
use rmpv::Value;

// https://github.com/msgpack/msgpack/blob/master/spec.md#timestamp-extension-type
pub fn datetime_to_rmpv(dt: DateTime<Utc>) -> Value {
  let nanos = dt.timestamp_subsec_nanos();
  let raw = match u32::try_from(dt.timestamp()) {
    Ok(sec) if nanos == 0 => sec.to_be_bytes().to_vec(),
    _ => {
      let mut raw = nanos.to_be_bytes().to_vec();
      raw.extend_from_slice(&dt.timestamp().to_be_bytes());
      raw
    }
  };
  Value::Ext(-1, raw)
}
