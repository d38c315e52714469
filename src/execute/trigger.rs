use crate::execute::DEFAULT_STOP_COL_LABEL;
use crate::table::GroupKey;
use crate::time::{Duration, Time};

/// Decides when a buffered partition is complete and may be flushed downstream.
/// Every partition is flushed at finish regardless of its trigger.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Trigger {
    /// Complete once the watermark passes the partition's `_stop` bound plus the lateness.
    AfterWatermark { allowed_lateness: Duration },
    /// Complete once the partition has buffered at least this many rows.
    AfterAtLeastCount(usize),
    /// Only flushed at finish.
    Finally,
}

impl Default for Trigger {
    fn default() -> Trigger {
        Trigger::AfterWatermark {
            allowed_lateness: Duration(0),
        }
    }
}

pub struct TriggerContext<'a> {
    pub key: &'a GroupKey,
    pub rows: usize,
    pub watermark: Time,
}

impl Trigger {
    pub fn triggered(&self, ctx: &TriggerContext) -> bool {
        match self {
            Trigger::AfterWatermark { allowed_lateness } => {
                match ctx
                    .key
                    .index(DEFAULT_STOP_COL_LABEL)
                    .and_then(|j| ctx.key.value_time(j))
                {
                    Some(stop) => ctx.watermark >= stop + *allowed_lateness,
                    None => false,
                }
            }
            Trigger::AfterAtLeastCount(n) => ctx.rows >= *n,
            Trigger::Finally => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColMeta, DataType, Value};

    fn stop_key(stop: i64) -> GroupKey {
        GroupKey::new(
            vec![ColMeta::new("_stop", DataType::Time)],
            vec![Value::Time(Time(stop))],
        )
        .expect("valid key")
    }

    #[test]
    fn it_triggers_after_watermark_passes_stop() {
        let key = stop_key(10);
        let trigger = Trigger::default();
        let ctx = |watermark| TriggerContext {
            key: &key,
            rows: 1,
            watermark: Time(watermark),
        };
        assert!(!trigger.triggered(&ctx(9)));
        assert!(trigger.triggered(&ctx(10)));

        let late = Trigger::AfterWatermark {
            allowed_lateness: Duration(5),
        };
        assert!(!late.triggered(&ctx(14)));
        assert!(late.triggered(&ctx(15)));
    }

    #[test]
    fn it_never_triggers_on_watermark_without_stop_column() {
        let key = GroupKey::empty();
        let ctx = TriggerContext {
            key: &key,
            rows: 100,
            watermark: Time::MAX,
        };
        assert!(!Trigger::default().triggered(&ctx));
        assert!(!Trigger::Finally.triggered(&ctx));
        assert!(Trigger::AfterAtLeastCount(100).triggered(&ctx));
    }
}
