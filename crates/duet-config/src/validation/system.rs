use crate::schema::DuetConfig;

use super::helpers::validate_range;

pub(crate) fn validate_pool(errors: &mut Vec<String>, config: &DuetConfig) {
    validate_range(errors, "pool.capacity", config.pool.capacity, 2, 64);
}
