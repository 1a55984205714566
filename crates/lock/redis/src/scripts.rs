/// Lua script for acquiring a lock record (SET NX PX).
///
/// KEYS\[1\] = lock key
/// ARGV\[1\] = holder token
/// ARGV\[2\] = TTL in milliseconds
///
/// Returns 1 if set, 0 if the key already existed.
pub const SET_IF_ABSENT: &str = r"
local ok = redis.call('SET', KEYS[1], ARGV[1], 'NX', 'PX', ARGV[2])
if ok then
    return 1
end
return 0
";

/// Lua script for deleting a lock record held by a given token.
///
/// KEYS\[1\] = lock key
/// ARGV\[1\] = expected holder token
///
/// Returns 1 if deleted, 0 if missing or held by another token.
pub const COMPARE_AND_DELETE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Lua script for resetting the expiry of a lock record held by a given
/// token.
///
/// KEYS\[1\] = lock key
/// ARGV\[1\] = expected holder token
/// ARGV\[2\] = new TTL in milliseconds
///
/// Returns 1 if extended, 0 if missing or held by another token.
pub const COMPARE_AND_SET_EXPIRY: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_scripts_read_before_acting() {
        for script in [COMPARE_AND_DELETE, COMPARE_AND_SET_EXPIRY] {
            assert!(script.contains("redis.call('GET', KEYS[1]) == ARGV[1]"));
        }
        assert!(COMPARE_AND_DELETE.contains("redis.call('DEL', KEYS[1])"));
        assert!(COMPARE_AND_SET_EXPIRY.contains("redis.call('PEXPIRE', KEYS[1], ARGV[2])"));
    }

    #[test]
    fn acquire_script_is_set_nx_px() {
        assert!(SET_IF_ABSENT.contains("'NX', 'PX'"));
    }
}
