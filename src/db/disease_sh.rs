pub mod covid_us_daily_archive;
pub mod lib_disease_sh;
