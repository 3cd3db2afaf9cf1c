use esesc_boot::config::ConfStore;
use esesc_boot::power::PowerModel;
use mockall::mock;

mock! {
    #[derive(Debug)]
    pub Power {}
    impl PowerModel for Power {
        fn plug(&mut self, section: &str, conf: &mut ConfStore);
        fn unplug(&mut self);
        fn start_dump(&mut self);
        fn stop_dump(&mut self);
    }
}
