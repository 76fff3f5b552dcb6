//! This module contains the macros used in the project.

/// ask for a value, store it in the config file and return it
macro_rules! config_value {
    ($config:ident, $section:ident, $struct_name:ident, $key_name:ident, $string:expr, $reader:path) => {{
        println!(concat!("Please enter ", $string, ":"));
        let value: String = $reader()?;
        let cloned_value = value.clone();
        $config.update(|config_data| {
            let local_config = config_data
                .$section
                .get_or_insert_with($struct_name::default);
            local_config.$key_name = Some(cloned_value);
        })?;
        value
    }};
}

/// read a value from the config, asking for it when missing
macro_rules! config_value_wrap {
    ($config:ident, $section:ident, $struct_name:ident, $key_name:ident, $string:expr) => {
        match $config
            .config_data
            .$section
            .as_ref()
            .and_then(|c| c.$key_name.clone())
        {
            Some(value) => value,
            None => $crate::config_value!(
                $config,
                $section,
                $struct_name,
                $key_name,
                $string,
                $crate::utils::input
            ),
        }
    };
}

/// read a secret from the config, asking for it (without echo) when missing
macro_rules! config_password_wrap {
    ($config:ident, $section:ident, $struct_name:ident, $key_name:ident, $string:expr) => {
        match $config
            .config_data
            .$section
            .as_ref()
            .and_then(|c| c.$key_name.clone())
        {
            Some(value) => value,
            None => $crate::config_value!(
                $config,
                $section,
                $struct_name,
                $key_name,
                $string,
                $crate::utils::get_password
            ),
        }
    };
}

pub(crate) use config_password_wrap;
pub(crate) use config_value;
pub(crate) use config_value_wrap;
