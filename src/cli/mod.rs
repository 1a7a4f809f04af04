use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mr-storage-initializer")]
#[command(version, about = "Download a model indexed in the model registry", long_about = None)]
pub struct Cli {
	/// Registry URI of the model (e.g., "model-registry://sklearn-iris/v2")
	pub src_uri: String,

	/// Directory the model is downloaded into
	pub dest_path: PathBuf,

	/// Model name reported in logs; the download folder is named after the registry entry
	#[arg(long, default_value = "")]
	pub model_name: String,
}
