use {std::env, thiserror::Error};

/// Stack size for tasks that do not ask for a particular one.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Settings for a [`Scheduler`][`crate::Scheduler`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config
{
    /// Stack size in bytes for [`Scheduler::spawn`][`crate::Scheduler::spawn`].
    pub default_stack_size: usize,

    /// Whether to drop the collector's warnings about
    /// repeated large allocations (see [`roots::register`]).
    ///
    /// [`roots::register`]: `crate::roots::register`
    pub filter_large_allocation_warnings: bool,
}

/// Returned when the environment holds an invalid setting.
#[allow(missing_docs)]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError
{
    #[error("Invalid stack size {0:?}; expected bytes with optional k or m suffix")]
    InvalidStackSize(String),

    #[error("Invalid value {value:?} for {name}; expected 0 or 1")]
    InvalidFlag{name: &'static str, value: String},
}

impl Default for Config
{
    fn default() -> Self
    {
        Self{
            default_stack_size: DEFAULT_STACK_SIZE,
            // Only wasm targets are known to need it.
            filter_large_allocation_warnings: cfg!(target_family = "wasm"),
        }
    }
}

impl Config
{
    /// Read settings from the environment.
    ///
    /// `FUBUKI_STACK_SIZE` sets the default stack size,
    /// and `FUBUKI_FILTER_GC_WARNINGS` enables or disables the filter.
    /// Unset variables keep their default.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through the given lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let mut config = Self::default();

        if let Some(value) = lookup("FUBUKI_STACK_SIZE") {
            config.default_stack_size = parse_size(&value)
                .ok_or(ConfigError::InvalidStackSize(value))?;
        }

        if let Some(value) = lookup("FUBUKI_FILTER_GC_WARNINGS") {
            let flag = match value.trim() {
                "0" => Some(false),
                "1" => Some(true),
                _   => None,
            };
            config.filter_large_allocation_warnings = flag.ok_or_else(||
                ConfigError::InvalidFlag{name: "FUBUKI_FILTER_GC_WARNINGS", value}
            )?;
        }

        Ok(config)
    }
}

/// Parse a byte count such as `65536`, `64k`, or `1M`.
fn parse_size(value: &str) -> Option<usize>
{
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last()? {
        'k' | 'K' => (&value[.. value.len() - 1], 1024),
        'm' | 'M' => (&value[.. value.len() - 1], 1024 * 1024),
        _         => (value, 1),
    };
    let size: usize = digits.parse().ok()?;
    size.checked_mul(multiplier).filter(|&size| size > 0)
}

#[cfg(test)]
mod tests
{
    use {super::*, proptest::proptest, std::collections::HashMap};

    fn lookup<'a>(vars: &[(&'a str, &'a str)])
        -> impl Fn(&str) -> Option<String> + 'a
    {
        let vars: HashMap<_, _> = vars.iter().copied().collect();
        move |name| vars.get(name).map(|value| value.to_string())
    }

    #[test]
    fn empty_environment_gives_defaults()
    {
        assert_eq!(Config::from_lookup(lookup(&[])).unwrap(), Config::default());
    }

    #[test]
    fn stack_size_suffixes()
    {
        assert_eq!(parse_size("65536"), Some(65536));
        assert_eq!(parse_size("64k"), Some(64 * 1024));
        assert_eq!(parse_size(" 2M "), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("0"), None);
        assert_eq!(parse_size("k"), None);
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn settings_are_read()
    {
        let config = Config::from_lookup(lookup(&[
            ("FUBUKI_STACK_SIZE", "1m"),
            ("FUBUKI_FILTER_GC_WARNINGS", "1"),
        ])).unwrap();
        assert_eq!(config.default_stack_size, 1024 * 1024);
        assert!(config.filter_large_allocation_warnings);
    }

    #[test]
    fn invalid_flag_is_reported()
    {
        let err = Config::from_lookup(lookup(&[
            ("FUBUKI_FILTER_GC_WARNINGS", "yes"),
        ])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlag{..}));
    }

    proptest!
    {
        #[test]
        fn kibibytes_agree_with_bytes(n in 1usize .. 1 << 20)
        {
            assert_eq!(parse_size(&format!("{n}k")), parse_size(&format!("{}", n * 1024)));
        }
    }
}
