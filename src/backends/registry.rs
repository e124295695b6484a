use crate::backends::config::{BackendConfig, BinarySpecifier, OutputFormat};
use std::collections::{BTreeMap, HashMap};

const DPKG_FORMAT: &str = r"-f='${db:Status-Status}\t${Package}\t${Version}\n'";
const DPKG_INSTALLED: &str = r"(?m)^installed\t([^\t]+)\t(\S+)$";
const RPM_FORMAT: &str = r"--qf '%{NAME}\t%{VERSION}-%{RELEASE}\n'";

/// Built-in backend configurations, keyed by backend name
pub fn builtin_backends() -> BTreeMap<String, BackendConfig> {
    let mut backends = BTreeMap::new();

    // === APT Backend ===
    // dpkg-query also lists removed-but-configured packages, hence the status filter
    backends.insert(
        "apt".to_string(),
        BackendConfig {
            name: "apt".to_string(),
            binary: BinarySpecifier::Single("apt-get".to_string()),
            list_cmd: Some(format!("dpkg-query -W {}", DPKG_FORMAT)),
            install_cmd: "{binary} install -y {package}".to_string(),
            install_version_cmd: Some("{binary} install -y {package}={version}".to_string()),
            remove_cmd: Some("{binary} remove -y {package}".to_string()),
            query_cmd: Some(format!("dpkg-query -W {} {{package}}", DPKG_FORMAT)),
            list_format: OutputFormat::Regex,
            list_regex: Some(DPKG_INSTALLED.to_string()),
            list_regex_name_group: Some(1),
            list_regex_version_group: Some(2),
            needs_sudo: true,
            env: Some(HashMap::from([(
                "DEBIAN_FRONTEND".to_string(),
                "noninteractive".to_string(),
            )])),
            ..Default::default()
        },
    );

    // === YUM / DNF Backend ===
    backends.insert(
        "yum".to_string(),
        BackendConfig {
            name: "yum".to_string(),
            binary: BinarySpecifier::Multiple(vec!["dnf".to_string(), "yum".to_string()]),
            list_cmd: Some(format!("rpm -qa {}", RPM_FORMAT)),
            install_cmd: "{binary} install -y {package}".to_string(),
            install_version_cmd: Some("{binary} install -y {package}-{version}".to_string()),
            remove_cmd: Some("{binary} remove -y {package}".to_string()),
            query_cmd: Some(format!("rpm -q {} {{package}}", RPM_FORMAT)),
            list_format: OutputFormat::TabSeparated,
            list_name_col: Some(0),
            list_version_col: Some(1),
            needs_sudo: true,
            ..Default::default()
        },
    );

    // === Homebrew Backend ===
    backends.insert(
        "brew".to_string(),
        BackendConfig {
            name: "brew".to_string(),
            binary: BinarySpecifier::Single("brew".to_string()),
            list_cmd: Some("{binary} list --versions".to_string()),
            install_cmd: "{binary} install {package}".to_string(),
            install_version_cmd: Some("{binary} install {package}@{version}".to_string()),
            remove_cmd: Some("{binary} uninstall {package}".to_string()),
            query_cmd: Some("{binary} list --versions {package}".to_string()),
            list_format: OutputFormat::SplitWhitespace,
            list_name_col: Some(0),
            list_version_col: Some(1),
            needs_sudo: false,
            ..Default::default()
        },
    );

    // === PIP Backend ===
    backends.insert(
        "pip".to_string(),
        BackendConfig {
            name: "pip".to_string(),
            binary: BinarySpecifier::Multiple(vec!["pip3".to_string(), "pip".to_string()]),
            list_cmd: Some("{binary} list --format=json 2>/dev/null".to_string()),
            install_cmd: "{binary} install {package}".to_string(),
            install_version_cmd: Some("{binary} install {package}=={version}".to_string()),
            remove_cmd: Some("{binary} uninstall -y {package}".to_string()),
            query_cmd: None,
            list_format: OutputFormat::Json,
            list_json_path: Some(String::new()),
            list_name_key: Some("name".to_string()),
            list_version_key: Some("version".to_string()),
            needs_sudo: false,
            env: Some(HashMap::from([(
                "PIP_DISABLE_PIP_VERSION_CHECK".to_string(),
                "1".to_string(),
            )])),
            ..Default::default()
        },
    );

    // === Flatpak Backend ===
    backends.insert(
        "flatpak".to_string(),
        BackendConfig {
            name: "flatpak".to_string(),
            binary: BinarySpecifier::Single("flatpak".to_string()),
            list_cmd: Some("{binary} list --app --columns=application,version".to_string()),
            install_cmd: "{binary} install -y --noninteractive flathub {package}".to_string(),
            install_version_cmd: None,
            remove_cmd: Some("{binary} uninstall -y --noninteractive {package}".to_string()),
            query_cmd: None,
            list_format: OutputFormat::TabSeparated,
            list_name_col: Some(0),
            list_version_col: Some(1),
            needs_sudo: false,
            ..Default::default()
        },
    );

    // === NPM Backend ===
    backends.insert(
        "npm".to_string(),
        BackendConfig {
            name: "npm".to_string(),
            binary: BinarySpecifier::Single("npm".to_string()),
            list_cmd: Some("{binary} ls -g --depth=0 --json 2>/dev/null".to_string()),
            install_cmd: "{binary} install -g {package}".to_string(),
            install_version_cmd: Some("{binary} install -g {package}@{version}".to_string()),
            remove_cmd: Some("{binary} uninstall -g {package}".to_string()),
            query_cmd: None,
            list_format: OutputFormat::Json,
            list_json_path: Some("dependencies".to_string()),
            list_version_key: Some("version".to_string()),
            needs_sudo: false,
            ..Default::default()
        },
    );

    // === Pacman Backend ===
    backends.insert(
        "pacman".to_string(),
        BackendConfig {
            name: "pacman".to_string(),
            binary: BinarySpecifier::Single("pacman".to_string()),
            list_cmd: Some("{binary} -Q".to_string()),
            install_cmd: "{binary} -S --noconfirm --needed {package}".to_string(),
            install_version_cmd: None,
            remove_cmd: Some("{binary} -R --noconfirm {package}".to_string()),
            query_cmd: Some("{binary} -Q {package}".to_string()),
            list_format: OutputFormat::SplitWhitespace,
            list_name_col: Some(0),
            list_version_col: Some(1),
            needs_sudo: true,
            ..Default::default()
        },
    );

    backends
}

/// Built-ins with user definitions layered on top. A user backend with a
/// built-in's name replaces it entirely.
pub fn load_all_backends(user_backends: Vec<BackendConfig>) -> BTreeMap<String, BackendConfig> {
    let mut backends = builtin_backends();
    for config in user_backends {
        backends.insert(config.name.to_lowercase(), config);
    }
    backends
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::parsers::parse_package_list;

    #[test]
    fn every_builtin_can_list_and_install() {
        let backends = builtin_backends();
        for name in ["apt", "yum", "brew", "pip", "flatpak", "npm", "pacman"] {
            let config = backends.get(name).unwrap();
            assert_eq!(config.name, name);
            assert!(config.list_cmd.is_some(), "{} has no list command", name);
            assert!(config.install_cmd.contains("{package}"));
        }
    }

    #[test]
    fn apt_listing_skips_config_files_state() {
        let config = &builtin_backends()["apt"];
        let output = b"installed\tcurl\t8.5.0-2ubuntu10\nconfig-files\told-thing\t1.0\ninstalled\tjq\t1.7.1-3\n";
        let packages = parse_package_list(output, config).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(
            packages.get("curl"),
            Some(&Some("8.5.0-2ubuntu10".to_string()))
        );
        assert!(!packages.contains_key("old-thing"));
    }

    #[test]
    fn npm_listing_reads_dependencies_object() {
        let config = &builtin_backends()["npm"];
        let output = br#"{"dependencies":{"typescript":{"version":"5.4.5"},"@angular/cli":{"version":"17.0.0"}}}"#;
        let packages = parse_package_list(output, config).unwrap();
        assert_eq!(packages.get("typescript"), Some(&Some("5.4.5".to_string())));
        assert!(packages.contains_key("@angular/cli"));
    }

    #[test]
    fn user_backend_overrides_builtin() {
        let custom = BackendConfig {
            name: "brew".to_string(),
            binary: BinarySpecifier::Single("/opt/homebrew/bin/brew".to_string()),
            install_cmd: "{binary} install --quiet {package}".to_string(),
            ..Default::default()
        };
        let backends = load_all_backends(vec![custom]);
        assert_eq!(
            backends["brew"].install_cmd,
            "{binary} install --quiet {package}"
        );
        assert!(backends["brew"].list_cmd.is_none());
        assert!(backends.contains_key("apt"));
    }
}
