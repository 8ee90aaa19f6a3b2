//! The built-in package catalog.
//!
//! Dependencies that are not catalog names (`curl`, `gcc`, ...) are bare system
//! commands; when one is missing it is installed through APT before the
//! package's own script runs.

use super::descriptor::{Category, PackageDescriptor, VersionManager};

/// The interpreter whose system copy underlies OS tooling; never replaced automatically
pub const SYSTEM_INTERPRETER: &str = "python";

/// APT package providing a bare system command, when it differs from the command name
pub const SYSTEM_COMMAND_PACKAGES: &[(&str, &str)] = &[
    ("gcc", "build-essential"),
    ("make", "build-essential"),
    ("g++", "build-essential"),
    ("pip3", "python3-pip"),
    ("gpg", "gnupg"),
    ("add-apt-repository", "software-properties-common"),
];

pub fn apt_package_for_command(command: &str) -> &str {
    SYSTEM_COMMAND_PACKAGES
        .iter()
        .find(|(cmd, _)| *cmd == command)
        .map(|(_, pkg)| *pkg)
        .unwrap_or(command)
}

pub fn builtin_packages() -> Vec<PackageDescriptor> {
    vec![
        // =====================================================================
        // Language runtimes
        // =====================================================================
        PackageDescriptor::new("node", "Node.js JavaScript runtime", Category::Runtime)
            .with_dependencies(&["curl"])
            .with_detection(&["node", "npm"])
            .with_versions("20", &["18", "20", "22"])
            .with_apt_packages(&["nodejs", "npm"])
            .with_version_manager(VersionManager::Nvm),
        PackageDescriptor::new("python", "Python 3 interpreter", Category::Runtime)
            .with_dependencies(&["curl", "gcc", "make"])
            .with_detection(&["python3"])
            .with_versions("3.12", &["3.10", "3.11", "3.12", "3.13"])
            .with_version_probe("python3", &["--version"])
            .with_apt_packages(&["python3.1[0-3]", "python3.1[0-3]-venv", "python3.1[0-3]-dev"])
            .with_version_manager(VersionManager::Pyenv),
        PackageDescriptor::new("go", "Go toolchain", Category::Runtime)
            .with_dependencies(&["curl", "tar"])
            .with_versions("1.22", &["1.21", "1.22", "1.23"])
            .with_version_probe("go", &["version"])
            .with_apt_packages(&["golang", "golang-go", "golang-1.*"])
            .with_version_manager(VersionManager::Goenv),
        PackageDescriptor::new("rust", "Rust toolchain via rustup", Category::Runtime)
            .with_dependencies(&["curl", "gcc"])
            .with_detection(&["rustc", "cargo"])
            .with_version_probe("rustc", &["--version"])
            .with_apt_packages(&["rustc", "cargo"]),
        PackageDescriptor::new("java", "OpenJDK runtime and compiler", Category::Runtime)
            .with_dependencies(&["curl", "unzip"])
            .with_detection(&["java", "javac"])
            .with_versions("21", &["17", "21"])
            .with_version_probe("java", &["-version"])
            .with_apt_packages(&["openjdk-*-jdk", "openjdk-*-jre", "openjdk-*-jdk-headless", "openjdk-*-jre-headless"])
            .with_version_manager(VersionManager::Sdkman),
        PackageDescriptor::new("ruby", "Ruby interpreter", Category::Runtime)
            .with_dependencies(&["curl", "gcc", "make"])
            .with_versions("3.3", &["3.2", "3.3"])
            .with_apt_packages(&["ruby", "ruby-full", "ruby3.*"])
            .with_version_manager(VersionManager::Rbenv),
        PackageDescriptor::new("php", "PHP interpreter and FPM", Category::Runtime)
            .with_dependencies(&["add-apt-repository"])
            .with_versions("8.3", &["8.1", "8.2", "8.3"])
            .with_version_probe("php", &["-v"])
            .with_service("php8.3-fpm", true)
            .with_apt_packages(&["php8.*", "php8.*-*", "php-common"])
            .with_config_files(&["etc/php/8.3/fpm/php.ini", "etc/php/8.3/cli/php.ini"]),
        PackageDescriptor::new("composer", "PHP dependency manager", Category::Tool)
            .with_dependencies(&["php", "curl", "unzip"]),
        // =====================================================================
        // Web servers
        // =====================================================================
        PackageDescriptor::new("nginx", "nginx web server", Category::WebServer)
            .with_service("nginx", false)
            .with_version_probe("nginx", &["-v"])
            .with_apt_packages(&["nginx", "nginx-common", "nginx-core"])
            .with_config_files(&["etc/nginx/nginx.conf"]),
        PackageDescriptor::new("apache", "Apache HTTP server", Category::WebServer)
            .with_detection(&["apache2"])
            .with_service("apache2", false)
            .with_version_probe("apache2", &["-v"])
            .with_apt_packages(&["apache2", "apache2-bin", "apache2-data", "apache2-utils"])
            .with_config_files(&["etc/apache2/apache2.conf"]),
        // =====================================================================
        // Databases
        // =====================================================================
        PackageDescriptor::new("postgresql", "PostgreSQL database server", Category::Database)
            .with_dependencies(&["curl", "gpg"])
            .with_detection(&["psql"])
            .with_versions("16", &["14", "15", "16"])
            .with_service("postgresql", false)
            .with_version_probe("psql", &["--version"])
            .with_apt_packages(&["postgresql", "postgresql-*", "postgresql-client-*", "postgresql-common"]),
        PackageDescriptor::new("mysql", "MySQL database server", Category::Database)
            .with_service("mysql", false)
            .with_apt_packages(&["mysql-server", "mysql-server-*", "mysql-client-*", "mysql-common"])
            .with_config_files(&["etc/mysql/my.cnf"]),
        PackageDescriptor::new("redis", "Redis in-memory data store", Category::Database)
            .with_detection(&["redis-server", "redis-cli"])
            .with_version_probe("redis-server", &["--version"])
            .with_apt_packages(&["redis-server", "redis-tools"])
            .with_config_files(&["etc/redis/redis.conf"]),
        PackageDescriptor::new("mongodb", "MongoDB document database", Category::Database)
            .with_dependencies(&["curl", "gpg"])
            .with_detection(&["mongod"])
            .with_versions("7.0", &["6.0", "7.0"])
            .with_version_probe("mongod", &["--version"])
            .with_apt_packages(&["mongodb-org", "mongodb-org-*"]),
        // =====================================================================
        // Containers and process managers
        // =====================================================================
        PackageDescriptor::new("docker", "Docker container engine", Category::Container)
            .with_dependencies(&["curl", "gpg"])
            .with_service("docker", false)
            .with_apt_packages(&["docker-ce", "docker-ce-cli", "containerd.io", "docker.io", "docker-buildx-plugin", "docker-compose-plugin"]),
        PackageDescriptor::new("pm2", "Node.js process manager", Category::ProcessManager)
            .with_dependencies(&["node"])
            .with_apt_packages(&[]),
        PackageDescriptor::new("yarn", "Yarn package manager", Category::Tool)
            .with_dependencies(&["node"]),
        PackageDescriptor::new("supervisor", "Supervisor process control system", Category::ProcessManager)
            .with_detection(&["supervisord", "supervisorctl"])
            .with_version_probe("supervisord", &["--version"])
            .with_config_files(&["etc/supervisor/supervisord.conf"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::validation::{validate_package_name, validate_relative_path};

    #[test]
    fn catalog_names_and_scripts_are_valid() {
        for pkg in builtin_packages() {
            validate_package_name(&pkg.name).unwrap();
            validate_relative_path(&pkg.script_path).unwrap();
            for config in &pkg.config_files {
                validate_relative_path(config).unwrap();
            }
            assert!(!pkg.detection_commands.is_empty(), "{} has no detection", pkg.name);
        }
    }

    #[test]
    fn versioned_packages_support_their_default() {
        for pkg in builtin_packages().into_iter().filter(|p| p.version_support) {
            let default = pkg.default_version.clone().unwrap();
            assert!(pkg.supports_version(&default), "{}", pkg.name);
        }
    }

    #[test]
    fn system_interpreter_is_in_catalog() {
        assert!(builtin_packages().iter().any(|p| p.name == SYSTEM_INTERPRETER));
    }

    #[test]
    fn command_to_apt_package() {
        assert_eq!(apt_package_for_command("gcc"), "build-essential");
        assert_eq!(apt_package_for_command("curl"), "curl");
    }
}
