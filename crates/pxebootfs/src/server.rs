//! FUSE session startup: option parsing, mountpoint validation, mount.

use std::path::Path;

use tracing::info;

use crate::error::{PxeBootError, Result};
use crate::filesystem::PxeBootFs;

/// Source name shown in the mount table.
pub const FS_NAME: &str = "pxebootfs";

/// Options accepted after `-o`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    /// Required for tftpd running as another user.
    pub allow_other: bool,
    /// Let root in besides the mounting user.
    pub allow_root: bool,
    /// Have the kernel check permission bits.
    pub default_permissions: bool,
    /// Unmount when the daemon exits.
    pub auto_unmount: bool,
    /// Allow mounting over a non-empty directory.
    pub nonempty: bool,
    /// Read-only mount.
    pub ro: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        MountOptions {
            allow_other: false,
            allow_root: false,
            default_permissions: false,
            auto_unmount: true,
            nonempty: false,
            ro: false,
        }
    }
}

/// Parse one or more comma-separated option strings.
pub fn parse_mount_options<S: AsRef<str>>(opts: &[S]) -> Result<MountOptions> {
    let mut options = MountOptions::default();

    for opt in opts.iter().flat_map(|s| s.as_ref().split(',')) {
        match opt.trim() {
            "allow_other" => options.allow_other = true,
            "allow_root" => options.allow_root = true,
            "default_permissions" => options.default_permissions = true,
            "auto_unmount" => options.auto_unmount = true,
            "nonempty" => options.nonempty = true,
            "ro" => options.ro = true,
            "rw" => options.ro = false,
            "" => {}
            other => {
                return Err(PxeBootError::InvalidArgument {
                    msg: format!("unknown mount option: {}", other),
                })
            }
        }
    }

    if options.allow_other && options.allow_root {
        return Err(PxeBootError::InvalidArgument {
            msg: "allow_other and allow_root are mutually exclusive".to_string(),
        });
    }

    Ok(options)
}

/// fuser options for `opts`.
pub fn build_mount_options(opts: &MountOptions) -> Vec<fuser::MountOption> {
    let mut fuser_opts = vec![fuser::MountOption::FSName(FS_NAME.into())];

    if opts.allow_other {
        fuser_opts.push(fuser::MountOption::AllowOther);
    }
    if opts.allow_root {
        fuser_opts.push(fuser::MountOption::AllowRoot);
    }
    if opts.default_permissions {
        fuser_opts.push(fuser::MountOption::DefaultPermissions);
    }
    if opts.auto_unmount {
        fuser_opts.push(fuser::MountOption::AutoUnmount);
    }
    if opts.nonempty {
        fuser_opts.push(fuser::MountOption::CUSTOM("nonempty".into()));
    }
    fuser_opts.push(if opts.ro {
        fuser::MountOption::RO
    } else {
        fuser::MountOption::RW
    });

    fuser_opts
}

/// `path` must be an existing directory.
pub fn validate_mountpoint(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PxeBootError::not_found(&path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(PxeBootError::InvalidArgument {
            msg: format!("mountpoint is not a directory: {}", path.display()),
        });
    }
    Ok(())
}

/// Mount `fs` at `mountpoint` and serve until unmounted.
pub fn serve(fs: PxeBootFs, mountpoint: &Path, opts: &MountOptions) -> Result<()> {
    validate_mountpoint(mountpoint)?;
    let fuser_opts = build_mount_options(opts);
    info!("mounting {} at {}", FS_NAME, mountpoint.display());
    fuser::mount2(fs, mountpoint, &fuser_opts)?;
    info!("{} unmounted", mountpoint.display());
    Ok(())
}
