cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        mod linux;
        pub use self::linux::*;
    } else {
        mod other;
        pub use self::other::*;
    }
}

use cfg_if::cfg_if;
