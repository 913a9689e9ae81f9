use crate::schema::DuetConfig;

use super::helpers::{validate_ip, validate_range};

pub(crate) fn validate_control(errors: &mut Vec<String>, config: &DuetConfig) {
    validate_ip(errors, "control.bind", &config.control.bind);
}

pub(crate) fn validate_video(errors: &mut Vec<String>, config: &DuetConfig) {
    let video = &config.video;
    validate_ip(errors, "video.bind", &video.bind);
    validate_range(errors, "video.keepalive_secs", video.keepalive_secs, 1, 60);
    validate_range(errors, "video.accept_timeout_secs", video.accept_timeout_secs, 0, 3600);
    validate_range(errors, "video.buffer_size", video.buffer_size, 1024, 1024 * 1024);

    // Every slot needs its own port below 65536.
    if video.base_port != 0 {
        let last = u32::from(video.base_port) + config.pool.capacity.saturating_sub(1);
        if last > u32::from(u16::MAX) {
            errors.push(format!(
                "video.base_port = {} leaves no room for {} players",
                video.base_port, config.pool.capacity
            ));
        }
    }

    if video.base_port != 0 && video.bind == config.control.bind {
        let range = u32::from(video.base_port)
            ..u32::from(video.base_port) + config.pool.capacity;
        if range.contains(&u32::from(config.control.port)) {
            errors.push(format!(
                "control.port = {} collides with the video port range",
                config.control.port
            ));
        }
    }
}
