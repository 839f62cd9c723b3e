macro_rules! impl_queue_consumer {
    ($ident:ident) => {
        #[deny(unconditional_recursion)] // method calls must defer to inherent methods
        impl crate::QueueConsumer for $ident {
            fn poll(
                &mut self,
                options: &crate::PollOptions,
            ) -> impl std::future::Future<Output = crate::Result<Vec<crate::Delivery>>> + Send {
                $ident::poll(self, options)
            }
        }
    };
}

macro_rules! impl_queue_producer {
    ($ident:ident) => {
        #[deny(unconditional_recursion)] // method calls must defer to inherent methods
        impl crate::QueueProducer for $ident {
            fn send_batch(
                &self,
                batch: &crate::Batch,
            ) -> impl std::future::Future<Output = crate::Result<crate::BatchSendResult>> + Send
            {
                $ident::send_batch(self, batch)
            }
        }
    };
}

macro_rules! impl_queue_admin {
    ($ident:ident) => {
        #[deny(unconditional_recursion)] // method calls must defer to inherent methods
        impl crate::QueueAdmin for $ident {
            fn create_queue(
                &self,
                name: &str,
                options: &crate::QueueOptions,
            ) -> impl std::future::Future<Output = crate::Result<crate::QueueHandle>> + Send {
                $ident::create_queue(self, name, options)
            }

            fn get_queue(
                &self,
                name: &str,
            ) -> impl std::future::Future<Output = crate::Result<crate::QueueHandle>> + Send {
                $ident::get_queue(self, name)
            }

            fn delete_queue(
                &self,
                name: &str,
            ) -> impl std::future::Future<Output = crate::Result<()>> + Send {
                $ident::delete_queue(self, name)
            }
        }
    };
}
