// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    inetstack::protocols::tcp::congestion_control::{
        self,
        CongestionControlConstructor,
        Options,
    },
    runtime::{
        fail::Fail,
        network::{
            config::TcpConfig,
            consts::{
                MAX_MSS,
                MIN_MSS,
            },
        },
    },
};
use ::std::{
    fs::File,
    io::Read,
    net::Ipv4Addr,
    ops::Index,
    path::Path,
    str::FromStr,
    time::Duration,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Global options.
mod global_config {
    // Local IPv4 addr.
    pub const LOCAL_IPV4_ADDR: &str = "local_ipv4_addr";
}

// Transport options. All of them are optional and fall back to the defaults of `TcpConfig`.
mod tcp_config {
    pub const SECTION_NAME: &str = "tcp";
    pub const MSS: &str = "mss";
    pub const RECEIVE_BUFFER_SIZE: &str = "receive_buffer_size";
    pub const SEND_BUFFER_SIZE: &str = "send_buffer_size";
    pub const HANDSHAKE_TIMEOUT: &str = "handshake_timeout_ms";
    pub const HANDSHAKE_RETRIES: &str = "handshake_retries";
    pub const INITIAL_RTO: &str = "initial_rto_ms";
    pub const MIN_RTO: &str = "min_rto_ms";
    pub const MAX_RTO: &str = "max_rto_ms";
    pub const IDLE_TIMEOUT: &str = "idle_timeout_ms";
    pub const ISN_RANGE: &str = "isn_range";
    pub const INITIAL_CWND: &str = "initial_cwnd";
    pub const INITIAL_SSTHRESH: &str = "initial_ssthresh";
    pub const CONGESTION_CONTROL: &str = "congestion_control";
}

// CUBIC parameters, nested under the transport section.
mod cubic_config {
    pub const SECTION_NAME: &str = "cubic";
    pub const FLOAT_OPTIONS: [&str; 2] = ["beta", "c"];
    pub const BOOL_OPTIONS: [&str; 2] = ["fast_convergence", "tcp_friendliness"];
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Stack configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self, Fail> {
        let mut config_s: String = String::new();
        File::open(config_path)?.read_to_string(&mut config_s)?;
        Self::from_str(&config_s)
    }

    /// Reads the local IPv4 address parameter from the environment variable first and then the underlying
    /// configuration.
    pub fn local_ipv4_addr(&self) -> Result<Ipv4Addr, Fail> {
        if let Some(addr) = Self::get_typed_env_option(global_config::LOCAL_IPV4_ADDR)? {
            return Ok(addr);
        }
        let local_ipv4_addr: Ipv4Addr =
            Self::get_typed_str_option(&self.0, global_config::LOCAL_IPV4_ADDR, |val: &str| val.parse().ok())?;
        if local_ipv4_addr.is_unspecified() || local_ipv4_addr.is_broadcast() {
            let cause: String = format!("invalid IPv4 address: {:?}", local_ipv4_addr);
            error!("local_ipv4_addr(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        Ok(local_ipv4_addr)
    }

    /// Builds the transport configuration. Missing keys keep their default value.
    pub fn tcp_config(&self) -> Result<TcpConfig, Fail> {
        let mut config: TcpConfig = TcpConfig::default();
        let section: &Yaml = match self.0.index(tcp_config::SECTION_NAME) {
            Yaml::BadValue => return Ok(config),
            _ => Self::get_subsection(&self.0, tcp_config::SECTION_NAME)?,
        };

        if let Some(mss) = Self::get_optional(section, tcp_config::MSS, Self::get_int_option::<usize>)? {
            Self::ensure(mss >= MIN_MSS && mss <= MAX_MSS, tcp_config::MSS)?;
            config = config.set_mss(mss);
        }
        if let Some(size) = Self::get_optional(section, tcp_config::RECEIVE_BUFFER_SIZE, Self::get_int_option::<u32>)? {
            Self::ensure(size > 0, tcp_config::RECEIVE_BUFFER_SIZE)?;
            config = config.set_receive_buffer_size(size as usize);
        }
        if let Some(size) = Self::get_optional(section, tcp_config::SEND_BUFFER_SIZE, Self::get_int_option::<usize>)? {
            Self::ensure(size > 0, tcp_config::SEND_BUFFER_SIZE)?;
            config = config.set_send_buffer_size(size);
        }
        if let Some(timeout) = Self::get_optional(section, tcp_config::HANDSHAKE_TIMEOUT, Self::get_duration_option)? {
            Self::ensure(timeout > Duration::ZERO, tcp_config::HANDSHAKE_TIMEOUT)?;
            config = config.set_handshake_timeout(timeout);
        }
        if let Some(retries) = Self::get_optional(section, tcp_config::HANDSHAKE_RETRIES, Self::get_int_option)? {
            config = config.set_handshake_retries(retries);
        }
        if let Some(rto) = Self::get_optional(section, tcp_config::INITIAL_RTO, Self::get_duration_option)? {
            Self::ensure(rto > Duration::ZERO, tcp_config::INITIAL_RTO)?;
            config = config.set_initial_rto(rto);
        }
        let min_rto: Duration = Self::get_optional(section, tcp_config::MIN_RTO, Self::get_duration_option)?
            .unwrap_or(config.get_min_rto());
        let max_rto: Duration = Self::get_optional(section, tcp_config::MAX_RTO, Self::get_duration_option)?
            .unwrap_or(config.get_max_rto());
        let idle_timeout: Duration = Self::get_optional(section, tcp_config::IDLE_TIMEOUT, Self::get_duration_option)?
            .unwrap_or(config.get_idle_timeout());
        Self::ensure(min_rto > Duration::ZERO && min_rto <= max_rto, tcp_config::MIN_RTO)?;
        Self::ensure(max_rto < idle_timeout, tcp_config::MAX_RTO)?;
        // Each setter checks against the other value as it stands.
        config = if idle_timeout > config.get_idle_timeout() {
            config.set_idle_timeout(idle_timeout).set_rto_bounds(min_rto, max_rto)
        } else {
            config.set_rto_bounds(min_rto, max_rto).set_idle_timeout(idle_timeout)
        };
        if let Some(range) = Self::get_optional(section, tcp_config::ISN_RANGE, Self::get_int_option::<u32>)? {
            Self::ensure(range > 0, tcp_config::ISN_RANGE)?;
            config = config.set_isn_range(range);
        }
        if let Some(cwnd) = Self::get_optional(section, tcp_config::INITIAL_CWND, Self::get_float_option)? {
            Self::ensure(cwnd >= 1.0, tcp_config::INITIAL_CWND)?;
            config = config.set_initial_cwnd(cwnd);
        }
        if let Some(ssthresh) = Self::get_optional(section, tcp_config::INITIAL_SSTHRESH, Self::get_float_option)? {
            Self::ensure(ssthresh >= 1.0, tcp_config::INITIAL_SSTHRESH)?;
            config = config.set_initial_ssthresh(ssthresh);
        }

        let ctor: CongestionControlConstructor = match Self::get_optional(
            section,
            tcp_config::CONGESTION_CONTROL,
            |yaml: &Yaml, index: &str| Self::get_typed_option(yaml, index, |v: &Yaml| v.as_str().map(String::from)),
        )? {
            Some(name) => match congestion_control::constructor_by_name(&name) {
                Some(ctor) => ctor,
                None => {
                    let cause: String = format!("unknown congestion control algorithm \"{}\"", name);
                    error!("tcp_config(): {}", cause);
                    return Err(Fail::new(libc::EINVAL, &cause));
                },
            },
            None => config.get_congestion_ctrl_type(),
        };
        let options: Option<Options> = self.cubic_options(section)?;
        config = config.set_congestion_ctrl(ctor, options);

        Ok(config)
    }

    /// Reads the optional CUBIC subsection of the transport section.
    fn cubic_options(&self, section: &Yaml) -> Result<Option<Options>, Fail> {
        let cubic: &Yaml = match section.index(cubic_config::SECTION_NAME) {
            Yaml::BadValue => return Ok(None),
            _ => Self::get_subsection(section, cubic_config::SECTION_NAME)?,
        };
        let mut options: Options = Options::default();
        for key in cubic_config::FLOAT_OPTIONS {
            if let Some(value) = Self::get_optional(cubic, key, Self::get_float_option)? {
                options.insert_float(key, value);
            }
        }
        for key in cubic_config::BOOL_OPTIONS {
            if let Some(value) = Self::get_optional(cubic, key, Self::get_bool_option)? {
                options.insert_bool(key, value);
            }
        }
        if let Some(beta) = options.get_float("beta") {
            Self::ensure(beta > 0.0 && beta < 1.0, "beta")?;
        }
        if let Some(c) = options.get_float("c") {
            Self::ensure(c > 0.0, "c")?;
        }
        Ok(Some(options))
    }

    //======================================================================================================================
    // Static Functions
    //======================================================================================================================

    /// Similar to `get_typed_option` using `Yaml::as_hash` receiver. This method returns a `&Yaml` instead of
    /// yaml::Hash, and Yaml is more natural for indexing.
    fn get_subsection<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        let section: &'a Yaml = Self::get_option(yaml, index)?;
        match section {
            Yaml::Hash(_) => Ok(section),
            _ => {
                let message: String = format!("parameter \"{}\" has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists.
    fn get_option<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match yaml.index(index) {
            Yaml::BadValue => {
                let message: String = format!("missing configuration option \"{}\"", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
            value => Ok(value),
        }
    }

    /// Runs `getter` only when `index` is present in `yaml`.
    fn get_optional<'a, T, Fn>(yaml: &'a Yaml, index: &str, getter: Fn) -> Result<Option<T>, Fail>
    where
        Fn: FnOnce(&'a Yaml, &str) -> Result<T, Fail>,
    {
        match yaml.index(index) {
            Yaml::BadValue => Ok(None),
            _ => getter(yaml, index).map(Some),
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it exists and that the receiver returns Some(_).
    fn get_typed_option<'a, T, Fn>(yaml: &'a Yaml, index: &str, receiver: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&'a Yaml) -> Option<T>,
    {
        let option: &'a Yaml = Self::get_option(yaml, index)?;
        match receiver(option) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("parameter {} has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find value at `index`, validating it as a string.
    fn get_typed_str_option<T, Fn>(yaml: &Yaml, index: &str, parser: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&str) -> Option<T>,
    {
        let option: &Yaml = Self::get_option(yaml, index)?;
        if let Some(value) = option.as_str() {
            if let Some(value) = parser(value) {
                return Ok(value);
            }
        }
        let message: String = format!("parameter {} has unexpected type", index);
        Err(Fail::new(libc::EINVAL, message.as_str()))
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            } else {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            }
        }
        Ok(None)
    }

    /// Similar to `get_typed_option` using `Yaml::as_i64` as the receiver, but additionally verifies that the
    /// destination type may hold the i64 value.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = Self::get_typed_option(yaml, index, Yaml::as_i64)?;
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }

    /// Reads a millisecond count as a [Duration].
    fn get_duration_option(yaml: &Yaml, index: &str) -> Result<Duration, Fail> {
        Self::get_int_option::<u64>(yaml, index).map(Duration::from_millis)
    }

    /// Reads a real number. Integers are accepted as well.
    fn get_float_option(yaml: &Yaml, index: &str) -> Result<f64, Fail> {
        Self::get_typed_option(yaml, index, |value: &Yaml| {
            value.as_f64().or_else(|| value.as_i64().map(|i| i as f64))
        })
    }

    /// Same as `Self::get_typed_option` using `Yaml::as_bool` as the receiver.
    fn get_bool_option(yaml: &Yaml, index: &str) -> Result<bool, Fail> {
        Self::get_typed_option(yaml, index, Yaml::as_bool)
    }

    fn ensure(condition: bool, index: &str) -> Result<(), Fail> {
        if condition {
            Ok(())
        } else {
            let message: String = format!("parameter \"{}\" is out of range", index);
            Err(Fail::new(libc::EINVAL, message.as_str()))
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl FromStr for Config {
    type Err = Fail;

    /// Parses a configuration held in memory.
    fn from_str(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = YamlLoader::load_from_str(config_s)?;
        let config_obj: &Yaml = match &config[..] {
            [c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        };

        Ok(Self(config_obj.clone()))
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
