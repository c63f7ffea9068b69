//! Shared configuration constants for elsa_crawl
//!
//! Default values, DOM selectors and text markers used across the crawler.
//! The portal is German-language; marker phrases are matched verbatim.

/// Default ElsaPro entry point (frameset root)
pub const DEFAULT_BASE_URL: &str = "https://grp.volkswagenag.com/elsapro/elsaweb/ctr/elsaFs";

/// Default number of parallel workers
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Upper bound for parallel workers
///
/// Every worker holds its own browser context against the same account;
/// the portal starts rejecting sessions well before this.
pub const MAX_WORKERS_LIMIT: usize = 10;

/// Default cap on document rows taken from one category listing
pub const DEFAULT_MAX_DOCUMENTS_PER_CATEGORY: usize = 50;

/// Upper bound for the per-category document cap
pub const MAX_DOCUMENTS_LIMIT: usize = 500;

/// Default per-call automation timeout: 30 seconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Smallest accepted automation timeout
pub const MIN_TIMEOUT_MS: u64 = 5_000;

/// Default pause after a UI click before the frames are queried again
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 800;

/// Attempts for frame classification before giving up
pub const DEFAULT_FRAME_RETRY_ATTEMPTS: u32 = 5;

/// Base delay for frame classification backoff
pub const DEFAULT_FRAME_RETRY_BASE_MS: u64 = 500;

/// Timeout for the VIN input to appear after opening the search dialog
pub const VIN_INPUT_TIMEOUT_MS: u64 = 6_000;

/// Deadline for the login redirect chain (password + OTP) to land on elsaweb
pub const LOGIN_DEADLINE_SECS: u64 = 60;

/// Required VIN length
pub const VIN_LENGTH: usize = 17;

/// Minimum text length for a frame to count as a document
pub const MIN_DOCUMENT_LENGTH: usize = 100;

/// Number of characters of body HTML kept as preview metadata
pub const HTML_PREVIEW_CHARS: usize = 1000;

/// Phrases of which at least one must appear in a document body
pub const DOCUMENT_MARKERS: &[&str] = &[
    "Vorgangs-Nr",
    "Kundenaussage",
    "Kundenbemerkung",
    "Lösung",
    "Datum:",
    "Fahrzeug",
];

/// Minimum body text length for a frame to be classified as document detail
pub const DOCUMENT_FRAME_MIN_LENGTH: usize = 200;

/// Phrases that mark a frame as showing document detail
pub const DOCUMENT_FRAME_MARKERS: &[&str] = &[
    "Vorgangs-Nr",
    "Kundenaussage",
    "Kundenbemerkung",
    "Lösung",
    "Datum:",
];

/// Case-number token printed in every listing row (`12345/6`)
pub const CASE_NUMBER_PATTERN: &str = r"\d+/\d+";

/// Text present together only in the navigation tree
pub const NAVIGATION_MARKERS: &[&str] = &["Neuheiten", "Feldmaßnahmen"];

/// Extra marker used to reject the navigation tree as document content
pub const NAVIGATION_REJECT_MARKER: &str = "Hinweise";

/// Link target fragment marking a placeholder tree node
pub const EMPTY_PAGE_SENTINEL: &str = "emptyPage";

/// Query parameter carrying the tree-position token of a category
pub const LEVEL_CODE_PARAM: &str = "levelCode";

/// Prefix of the tree root label
pub const TREE_ROOT_LABEL: &str = "Handbuch Service Technik";

// Portal selectors

pub const TOOLBAR_FRAME_SELECTOR: &str = "#barFs";
pub const NEW_JOB_BUTTON_SELECTOR: &str = r"#toolbar\.button\.new\.job";
pub const VIN_INPUT_SELECTOR: &str = "input[name='vin']";
pub const MANUAL_SECTION_BUTTON_SELECTOR: &str = r"#infomedia\.button\.TPL";

pub const USERNAME_SELECTOR: &str = "#username";
pub const PASSWORD_SELECTOR: &str = "#password";
pub const TOTP_LOGIN_SELECTOR: &str = "#start_totp_login";
pub const OTP_SELECTORS: &[&str] = &["#otp", "input[name*=\"otp\"]"];

pub const JOB_DETAIL_SELECTORS: &[&str] = &[
    "input[name='job.customer.account']",
    "input[name='job.customer.lastName']",
    "input[name='job.vehicle.vin']",
    "input[name='job.vehicle.licensePlate']",
];
pub const CUSTOMER_FIELDSET_ID: &str = "fieldsetCustomer";
pub const VEHICLE_FIELDSET_ID: &str = "fieldsetVehicle";

/// Name of the frame that hosts the vehicle-history link
pub const MAIN_FRAME_NAME: &str = "mainFs";
pub const HISTORY_LINK_TEXT: &str = "Fahrzeughistorie";
pub const HISTORY_GRID_SELECTOR: &str = "[role=\"grid\"]";
pub const HISTORY_FRAME_URL_HINTS: &[&str] = &["history.html", "VehicleInfo"];

/// Chrome user agent string presented by launched browsers
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
