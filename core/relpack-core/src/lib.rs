/// relpack-core: release staging and packaging for a desktop application
///
/// A release run copies the application source into a throwaway staging
/// directory, leaving out whatever the ignore list names, minifies selected
/// scripts and stylesheets, installs dependencies (optionally from a local
/// cache), bumps the patch version and hands the staged tree to an external
/// packager once per target platform.
///
/// ## Pipeline
///
/// ```rust,no_run
/// use relpack_core::pipeline::{RunOptions, Session};
/// use relpack_core::platform::Platform;
/// use relpack_core::tool::SystemRunner;
///
/// let mut options = RunOptions::new("../app");
/// options.platforms = Some(vec![Platform::Win32, Platform::Darwin]);
///
/// let session = Session::prepare(options)?;
/// let report = session.run(&SystemRunner)?;
///
/// for path in report.packaging.outputs() {
///     println!("packaged {}", path.display());
/// }
/// # Ok::<(), relpack_core::error::PackError>(())
/// ```
///
/// ## Pieces
///
/// - [`ignore::IgnoreList`]: prefix (`dir/`) and basename rules, first match wins
/// - [`copy::TreeCopier`]: filtered copy plus empty-directory pruning
/// - [`minify`]: extension-based dispatch to external minifiers
/// - [`deps::install`]: cache restore, `npm install`, cache seed
/// - [`version::bump_patch`]: `major.minor.patch` patch bump
/// - [`packager::package_all`]: parallel per-platform packaging with fan-in
///
/// Every external process goes through [`tool::ToolRunner`], so the whole
/// pipeline can run against a fake in tests.
pub mod config;
pub mod copy;
pub mod deps;
pub mod error;
pub mod ignore;
pub mod minify;
pub mod packager;
pub mod pipeline;
pub mod platform;
pub mod tool;
pub mod version;
