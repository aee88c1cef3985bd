use std::path::PathBuf;

use clap::Parser;

/// Command line of the daemon.
#[derive(Debug, Parser)]
#[command(name = "pxebootfs")]
#[command(version)]
#[command(about = "Dynamic pxelinux.cfg and per-client root provisioning over FUSE", long_about = None)]
#[command(after_help = "Example: pxebootfs /var/lib/tftpboot/pxelinux.cfg -o allow_other")]
pub struct Cli {
    /// Directory to mount over, normally the tftp root's pxelinux.cfg.
    pub mountpoint: PathBuf,

    /// FUSE mount options, comma separated. May be repeated.
    #[arg(short = 'o', value_name = "OPTIONS")]
    pub options: Vec<String>,

    /// Config file; searched for in the usual places when omitted.
    #[arg(short, long, env = "PXEBOOTFS_CONFIG")]
    pub config: Option<PathBuf>,
}
