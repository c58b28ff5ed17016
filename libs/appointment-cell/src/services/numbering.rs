use chrono::{DateTime, Utc};
use rand::Rng;

const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 5;

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    String::from_utf8(digits).unwrap_or_default()
}

/// Human-facing reference: `APT-` + base36 millisecond timestamp + 5 random base36 characters.
pub fn generate_appointment_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())] as char)
        .collect();

    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    format!("APT-{}{}", to_base36(millis), suffix)
}
