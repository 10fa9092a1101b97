pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use futures::stream::{self, StreamExt as _, TryStreamExt as _};
pub use indexmap::{IndexMap, IndexSet};
pub use itertools::izip;
pub use noisy_float::prelude::*;
pub use once_cell::sync::Lazy;
pub use par_stream::prelude::*;
pub use semver::{Version, VersionReq};
pub use serde::{de::Error as DeserializeError, Deserialize, Deserializer, Serialize};
pub use std::{
    collections::HashSet,
    fmt::{self, Display},
    fs, io,
    ops::AddAssign,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
pub use tracing::{debug, info, warn};
