use crate::sink::ValueType;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum MetricValue {
    Integer(i64),
    Unsigned(u64),
    FloatingPoint(f64),
}

impl MetricValue {
    /// Clamps integer values into the range of the given integer value type.
    ///
    /// Collectors parse values according to the declared type, so an out-of-range value is pinned to the nearest bound
    /// rather than being wrapped around by the collector. Floating-point values are left alone.
    pub fn clamp_to(self, value_type: ValueType) -> Self {
        let Some((min, max)) = integer_bounds(value_type) else { return self };

        match self {
            MetricValue::Integer(v) => MetricValue::Integer(v.clamp(min, max)),
            MetricValue::Unsigned(v) => {
                MetricValue::Integer(i64::try_from(v).unwrap_or(i64::MAX).clamp(min, max))
            }
            MetricValue::FloatingPoint(_) => self,
        }
    }
}

fn integer_bounds(value_type: ValueType) -> Option<(i64, i64)> {
    match value_type {
        ValueType::Int8 => Some((i8::MIN.into(), i8::MAX.into())),
        ValueType::Uint8 => Some((0, u8::MAX.into())),
        ValueType::Int16 => Some((i16::MIN.into(), i16::MAX.into())),
        ValueType::Uint16 => Some((0, u16::MAX.into())),
        ValueType::Int32 => Some((i32::MIN.into(), i32::MAX.into())),
        ValueType::Uint32 => Some((0, u32::MAX.into())),
        ValueType::String | ValueType::Float | ValueType::Double => None,
    }
}

/// Renders metric values into their textual wire form.
///
/// The buffers are reused across values, so a single formatter should be kept around for an entire flush.
pub(crate) struct MetricValueFormatter {
    int_writer: itoa::Buffer,
    float_writer: ryu::Buffer,
}

impl MetricValueFormatter {
    pub fn new() -> Self {
        Self { int_writer: itoa::Buffer::new(), float_writer: ryu::Buffer::new() }
    }

    pub fn format(&mut self, value: MetricValue) -> &str {
        match value {
            MetricValue::Integer(v) => self.int_writer.format(v),
            MetricValue::Unsigned(v) => self.int_writer.format(v),
            MetricValue::FloatingPoint(v) => self.float_writer.format(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricValue, MetricValueFormatter};
    use crate::sink::ValueType;

    #[test]
    fn formats_values() {
        let mut formatter = MetricValueFormatter::new();

        assert_eq!(formatter.format(MetricValue::Unsigned(2)), "2");
        assert_eq!(formatter.format(MetricValue::Integer(-17)), "-17");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(42.5)), "42.5");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(1.0)), "1.0");
        assert_eq!(formatter.format(MetricValue::Integer(i64::MIN)), "-9223372036854775808");
    }

    #[test]
    fn clamps_integers_to_declared_type() {
        assert_eq!(MetricValue::Integer(i64::MAX).clamp_to(ValueType::Int32), MetricValue::Integer(2_147_483_647));
        assert_eq!(MetricValue::Integer(i64::MIN).clamp_to(ValueType::Int32), MetricValue::Integer(-2_147_483_648));
        assert_eq!(MetricValue::Integer(-5).clamp_to(ValueType::Uint32), MetricValue::Integer(0));
        assert_eq!(MetricValue::Unsigned(u64::MAX).clamp_to(ValueType::Uint32), MetricValue::Integer(4_294_967_295));
        assert_eq!(MetricValue::Unsigned(7).clamp_to(ValueType::Uint32), MetricValue::Integer(7));
        assert_eq!(MetricValue::Integer(i64::MAX).clamp_to(ValueType::Double), MetricValue::Integer(i64::MAX));
        assert_eq!(MetricValue::FloatingPoint(1e300).clamp_to(ValueType::Int32), MetricValue::FloatingPoint(1e300));
    }
}
