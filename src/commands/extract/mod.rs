use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cli::{ExtractArgs, LayoutProfile};
use crate::model::{
    Code, DebugCounts, DebugManifest, MissingKind, ResponseOption, Totals, VariableRecord,
};
use crate::util::{ensure_directory, now_utc_string, sha256_file, write_json_pretty};

mod config;
mod debug_artifacts;
mod fragments;
mod lines;
mod normalize;
mod record_machine;
mod run;
mod validation;

pub use run::run;

use config::*;
use debug_artifacts::*;
use fragments::*;
use lines::*;
use normalize::*;
use record_machine::*;
use run::{Extraction, extract_records};
use validation::*;
