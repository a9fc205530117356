//! System-wide constants and defaults.

/// Binary name for the CLI.
pub const BIN_NAME: &str = "skyweave";

/// Default directory that synthesized templates are written to.
pub const DEFAULT_OUTPUT_DIR: &str = "skyweave.out";

/// File name of the serialized deployment plan inside the output directory.
pub const PLAN_FILE_NAME: &str = "plan.json";

/// Separator between components of a construct path.
pub const PATH_SEPARATOR: char = '/';

/// Number of hex digits of the path hash appended to template ids.
pub const TEMPLATE_ID_HASH_LENGTH: usize = 8;

/// Default deployment stage name for API stacks.
pub const DEFAULT_STAGE_NAME: &str = "prod";

/// Separator between stack name and output name in export names.
pub const EXPORT_SEPARATOR: char = ':';

/// Format version stamped on every synthesized template.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Suffix of per-stack template files, before the format extension.
pub const TEMPLATE_FILE_SUFFIX: &str = ".template";
