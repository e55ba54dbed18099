pub mod codec_util;
pub mod data_input;
pub mod data_output;
pub mod directory;
pub mod fs_directory;
pub mod lock;
pub mod ram_directory;

pub use data_input::IndexInput;
pub use data_output::IndexOutput;
pub use directory::Directory;
pub use fs_directory::FsDirectory;
pub use ram_directory::RamDirectory;
