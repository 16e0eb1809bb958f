//! Formatting utilities

use glam::{Mat4, Quat, Vec3};

/// Format a vector with fixed precision
pub fn format_vec3(v: Vec3) -> String {
    format!("({:.4}, {:.4}, {:.4})", v.x, v.y, v.z)
}

/// Format a rotation as XYZ Euler angles in degrees
pub fn format_rotation(q: Quat) -> String {
    let (x, y, z) = q.to_euler(glam::EulerRot::XYZ);
    format!(
        "({:.2}°, {:.2}°, {:.2}°)",
        x.to_degrees(),
        y.to_degrees(),
        z.to_degrees()
    )
}

/// Format the translation part of a world matrix
pub fn format_position(m: &Mat4) -> String {
    format_vec3(m.w_axis.truncate())
}

/// Format a duration in seconds
pub fn format_seconds(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.1} ms", seconds * 1000.0)
    } else {
        format!("{seconds:.3} s")
    }
}

/// Format a yes/no flag
pub fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "-" }
}
