pub mod linuxcnc;
