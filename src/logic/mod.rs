//! Stage orchestration: `pre_chroot` runs from the live ISO, `post_chroot`
//! inside the chroot on the freshly bootstrapped system.

pub mod post_chroot;
pub mod pre_chroot;
