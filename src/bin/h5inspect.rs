use std::path::PathBuf;

use clap::Parser;

use h5container::config::{DriverKind, FileAccessOptions};
use h5container::external::{MockObjectHeaderStore, MockSharedMessageTable};
use h5container::{open_driver, FileContainer};

/// Decodes a container's superblock and prints it, grounded in
/// `peerofs`'s `erofs-dump` binary.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    path: PathBuf,

    /// Open the path as a family-member template (e.g. "data-%06d.h5")
    /// instead of a single sec2 file.
    #[arg(long)]
    family_member_size: Option<u64>,

    /// Open the path's directory as a multi-kind container named by its
    /// stem instead of a single sec2 file.
    #[arg(long)]
    multi: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let driver_kind = match (args.family_member_size, args.multi) {
        (Some(member_size), false) => DriverKind::Family { member_size },
        (None, true) => DriverKind::Multi,
        (None, false) => DriverKind::Sec2,
        (Some(_), true) => {
            eprintln!("--family-member-size and --multi are mutually exclusive");
            std::process::exit(1);
        }
    };

    let opts = FileAccessOptions { driver: driver_kind, ..FileAccessOptions::default() };
    let driver = open_driver(&args.path, &opts, false).unwrap_or_else(|e| {
        eprintln!("failed to open {}: {e}", args.path.display());
        std::process::exit(1);
    });
    // The object-header/SOHM layers are external collaborators this crate
    // doesn't persist; a fresh store here means a reopened v2 file's SOHM
    // info only round-trips within a single process (see the superblock
    // test suite), not across separate `h5inspect` invocations.
    let object_store = MockObjectHeaderStore::new(opts.sizeof_addr);
    let sohm_table = MockSharedMessageTable::default();
    let container = FileContainer::open(driver, &object_store, &sohm_table).unwrap_or_else(|e| {
        eprintln!("failed to decode superblock: {e}");
        std::process::exit(1);
    });

    let sb = container.superblock();
    println!("super_vers      = {}", sb.super_vers);
    println!("freespace_vers  = {}", sb.freespace_vers);
    println!("obj_dir_vers    = {}", sb.obj_dir_vers);
    println!("share_head_vers = {}", sb.share_head_vers);
    println!("sizeof_addr     = {}", sb.sizeof_addr.bytes());
    println!("sizeof_size     = {}", sb.sizeof_size.bytes());
    println!("sym_leaf_k      = {}", sb.sym_leaf_k);
    println!("btree_k         = {:?}", sb.btree_k);
    println!("consist_flags   = {:#x}", sb.consist_flags);
    println!("super_addr      = {:?}", sb.super_addr);
    println!("base_addr       = {:?}", sb.base_addr);
    println!("extension_addr  = {:?}", sb.extension());
    println!("sohm_info       = {:?}", sb.sohm_info);
    println!("stored_eoa      = {:?}", sb.stored_eoa);
    println!("driver_addr     = {:?}", sb.driver_addr);
    println!("root header_addr = {:?}", sb.root_entry.header_addr);

    if let Some(di) = container.driver_info() {
        println!(
            "driver-info: version={} name={:?} payload_len={}",
            di.version,
            String::from_utf8_lossy(&di.name),
            di.payload.len()
        );
    }
}
