pub use anyhow::{anyhow, bail, ensure, format_err, Context, Error, Result};
pub use argh::FromArgs;
pub use derivative::Derivative;
pub use itertools::Itertools;
pub use lazy_static::lazy_static;
pub use log::{debug, error, info, warn};
pub use maplit::btreemap;
pub use rand::{seq::SliceRandom, thread_rng};
pub use regex::Regex;
pub use serde::{
    de::Error as DeserializeError, ser::Error as SerializeError, Deserialize, Deserializer,
    Serialize, Serializer,
};
pub use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};
pub use tokio::sync::Semaphore;
